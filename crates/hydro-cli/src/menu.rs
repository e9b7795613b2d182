//! Menu states and the options each one offers.

use hydro_core::store::RecordStore;
use hydro_engine::SessionFacade;

// ─── Command ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  Initialize,
  Exit,
  Login,
  RegisterUser,
  Logout,
  AddUser,
  ListUsers,
  RemoveUser,
  UpdateUser,
  AddMeter,
  ListMeters,
  RemoveMeter,
  SetReading,
  CreateAccount,
  ListAccounts,
  RemoveAccount,
  RefreshAccount,
}

impl Command {
  /// Message key of the menu label.
  pub fn label_key(self) -> &'static str {
    match self {
      Self::Initialize => "command.initialize",
      Self::Exit => "command.exit",
      Self::Login => "command.login",
      Self::RegisterUser => "command.register_user",
      Self::Logout => "command.logout",
      Self::AddUser => "command.add_user",
      Self::ListUsers => "command.list_users",
      Self::RemoveUser => "command.remove_user",
      Self::UpdateUser => "command.update_user",
      Self::AddMeter => "command.add_meter",
      Self::ListMeters => "command.list_meters",
      Self::RemoveMeter => "command.remove_meter",
      Self::SetReading => "command.set_reading",
      Self::CreateAccount => "command.create_account",
      Self::ListAccounts => "command.list_accounts",
      Self::RemoveAccount => "command.remove_account",
      Self::RefreshAccount => "command.refresh_account",
    }
  }
}

// ─── State ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
  PreInitialized,
  LoggedOut,
  LoggedIn,
}

const PRE_INITIALIZED: &[(&str, Command)] = &[("1", Command::Initialize), ("0", Command::Exit)];

const LOGGED_OUT: &[(&str, Command)] = &[
  ("1", Command::Login),
  ("2", Command::RegisterUser),
  ("0", Command::Exit),
];

const LOGGED_IN: &[(&str, Command)] = &[
  ("1", Command::AddUser),
  ("2", Command::ListUsers),
  ("3", Command::RemoveUser),
  ("4", Command::UpdateUser),
  ("5", Command::AddMeter),
  ("6", Command::ListMeters),
  ("7", Command::RemoveMeter),
  ("8", Command::SetReading),
  ("9", Command::CreateAccount),
  ("10", Command::ListAccounts),
  ("11", Command::RemoveAccount),
  ("12", Command::RefreshAccount),
  ("0", Command::Logout),
];

impl MenuState {
  /// The state is derived from the facade, never stored separately.
  pub fn of<P: RecordStore>(facade: &SessionFacade<P>) -> Self {
    if !facade.is_initialized() {
      Self::PreInitialized
    } else if facade.has_session() {
      Self::LoggedIn
    } else {
      Self::LoggedOut
    }
  }

  pub fn title_key(self) -> &'static str {
    match self {
      Self::PreInitialized => "menu.pre_initialized",
      Self::LoggedOut => "menu.logged_out",
      Self::LoggedIn => "menu.logged_in",
    }
  }

  pub fn options(self) -> &'static [(&'static str, Command)] {
    match self {
      Self::PreInitialized => PRE_INITIALIZED,
      Self::LoggedOut => LOGGED_OUT,
      Self::LoggedIn => LOGGED_IN,
    }
  }

  /// Map operator input to a command available in this state.
  pub fn interpret(self, input: &str) -> Option<Command> {
    let input = input.trim();
    self
      .options()
      .iter()
      .find(|(code, _)| *code == input)
      .map(|(_, command)| *command)
  }
}
