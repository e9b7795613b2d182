//! The interactive console: prints the menu for the current state, reads the
//! operator's choice and drives the [`SessionFacade`].
//!
//! Input and output are generic so a scripted session can be run in tests.

use std::{
  io::{self, Write},
  sync::Arc,
};

use anyhow::Context as _;
use hydro_core::{
  event::{Event, Topic},
  store::RecordStore,
};
use hydro_engine::{PersistenceReport, SessionFacade};
use tokio::{
  io::{AsyncBufRead, AsyncBufReadExt, Lines},
  sync::mpsc::{UnboundedReceiver, unbounded_channel},
};

use crate::{
  menu::{Command, MenuState},
  messages::Messages,
};

#[derive(Debug, thiserror::Error)]
enum InputError {
  #[error("input closed")]
  Closed,
  #[error("{0:?} is not a number")]
  NotANumber(String),
}

pub struct Console<R, W> {
  lines:    Lines<R>,
  output:   W,
  messages: Arc<Messages>,
  /// Threshold alerts, wired once the system is initialised.
  alerts:   Option<UnboundedReceiver<Event>>,
}

impl<R, W> Console<R, W>
where
  R: AsyncBufRead + Unpin,
  W: Write,
{
  pub fn new(input: R, output: W, messages: Arc<Messages>) -> Self {
    Self { lines: input.lines(), output, messages, alerts: None }
  }

  #[cfg(test)]
  pub fn into_output(self) -> W { self.output }

  // ── Main loop ─────────────────────────────────────────────────────────────

  /// Run until the operator exits or input ends, then stop every meter.
  pub async fn run<P: RecordStore>(&mut self, facade: &mut SessionFacade<P>) -> anyhow::Result<()> {
    loop {
      let state = MenuState::of(facade);
      self.show_menu(state, facade)?;

      let line = match self.ask("menu.option").await {
        Ok(line) => line,
        Err(e) if is_closed(&e) => break,
        Err(e) => return Err(e),
      };
      let Some(command) = state.interpret(&line) else {
        self.say("menu.invalid", &[])?;
        continue;
      };
      if command == Command::Exit {
        break;
      }

      tracing::debug!(?command, "executing");
      if let Err(e) = self.execute(command, facade).await {
        match e.downcast::<InputError>() {
          Ok(InputError::Closed) => break,
          Ok(InputError::NotANumber(input)) => self.say("error.not_number", &[("input", input)])?,
          Err(e) => match e.downcast::<hydro_engine::Error>() {
            Ok(err) => self.say("error.operation", &[("reason", err.to_string())])?,
            Err(e) => return Err(e),
          },
        }
      }
    }

    // Input ending mid-session still checkpoints, as an explicit logout would.
    if facade.has_session() {
      let report = facade.logout().await?;
      self.report_persistence("save", &report)?;
    }
    self.say("system.goodbye", &[])?;
    facade.shutdown().await;
    Ok(())
  }

  async fn execute<P: RecordStore>(
    &mut self,
    command: Command,
    facade: &mut SessionFacade<P>,
  ) -> anyhow::Result<()> {
    match command {
      Command::Initialize => {
        let report = facade.initialize().await;
        self.report_persistence("load", &report)?;
        if report.orphans_removed > 0 {
          self.say("system.orphans", &[("count", report.orphans_removed.to_string())])?;
        }
        if report.duplicates_removed > 0 {
          self.say("system.duplicates", &[("count", report.duplicates_removed.to_string())])?;
        }

        let (tx, rx) = unbounded_channel();
        facade.subscribe_fn(Topic::MeterThresholdCrossed, "console-alerts", move |event| {
          tx.send(event.clone())
            .map_err(|_| anyhow::anyhow!("console is gone"))
        })?;
        self.alerts = Some(rx);

        self.say("system.started", &[
          ("users", facade.list_users()?.len().to_string()),
          ("meters", facade.list_meters()?.len().to_string()),
          ("accounts", facade.list_accounts()?.len().to_string()),
        ])?;
      }

      Command::Login => {
        let id = self.ask("prompt.user_id").await?;
        let secret = self.ask("prompt.secret").await?;
        let user = facade.login(&id, &secret)?;
        self.say("session.welcome", &[("name", user.name)])?;
      }

      Command::Logout => {
        let report = facade.logout().await?;
        self.report_persistence("save", &report)?;
        self.say("session.closed", &[])?;
      }

      Command::RegisterUser | Command::AddUser => {
        let id = self.ask("prompt.user_id").await?;
        let name = self.ask("prompt.name").await?;
        let secret = self.ask("prompt.secret").await?;
        let user = facade.register_user(&id, &name, &secret)?;
        self.say("user.created", &[("id", user.user_id.masked())])?;
      }

      Command::ListUsers => {
        let users = facade.list_users()?;
        if users.is_empty() {
          self.say("user.none", &[])?;
        }
        for user in users {
          self.say("user.row", &[("id", user.user_id.masked()), ("name", user.name)])?;
        }
      }

      Command::RemoveUser => {
        let id = self.ask("prompt.user_id").await?;
        let user = facade.delete_user(&id)?;
        self.say("user.removed", &[("id", user.user_id.masked())])?;
      }

      Command::UpdateUser => {
        let id = self.ask("prompt.user_id").await?;
        let name = self.ask("prompt.name").await?;
        let secret = self.ask("prompt.secret").await?;
        let user = facade.update_user(&id, &name, &secret)?;
        self.say("user.updated", &[("id", user.user_id.masked())])?;
      }

      Command::AddMeter => {
        let reading = self.ask_number("prompt.reading").await?;
        let meter = facade.create_meter(reading)?;
        self.say("meter.created", &[
          ("id", meter.meter_id.to_string()),
          ("reading", format_reading(meter.reading)),
        ])?;
      }

      Command::ListMeters => {
        let meters = facade.list_meters()?;
        if meters.is_empty() {
          self.say("meter.none", &[])?;
        }
        for meter in meters {
          let state = if meter.running { "meter.running" } else { "meter.stopped" };
          let state = self.messages.get(state).into_owned();
          self.say("meter.row", &[
            ("id", meter.meter_id.to_string()),
            ("reading", format_reading(meter.reading)),
            ("state", state),
          ])?;
        }
      }

      Command::RemoveMeter => {
        let id = self.ask("prompt.meter_id").await?;
        let meter = facade.delete_meter(&id)?;
        self.say("meter.removed", &[("id", meter.meter_id.to_string())])?;
      }

      Command::SetReading => {
        let id = self.ask("prompt.meter_id").await?;
        let reading = self.ask_number("prompt.reading").await?;
        let meter = facade.set_meter_reading(&id, reading)?;
        self.say("meter.updated", &[
          ("id", meter.meter_id.to_string()),
          ("reading", format_reading(meter.reading)),
        ])?;
      }

      Command::CreateAccount => {
        let user_id = self.ask("prompt.user_id").await?;
        let meter_id = self.ask("prompt.meter_id").await?;
        let account = facade.create_account(&user_id, &meter_id)?;
        self.say("account.created", &[
          ("id", account.account_id.to_string()),
          ("meter", account.meter_id.to_string()),
          ("reading", format_reading(account.last_reading)),
        ])?;
      }

      Command::ListAccounts => {
        let accounts = facade.list_accounts()?;
        if accounts.is_empty() {
          self.say("account.none", &[])?;
        }
        for account in accounts {
          self.say("account.row", &[
            ("id", account.account_id.to_string()),
            ("user", account.user_id.masked()),
            ("meter", account.meter_id.to_string()),
            ("reading", format_reading(account.last_reading)),
          ])?;
        }
      }

      Command::RemoveAccount => {
        let id = self.ask("prompt.account_id").await?;
        let account = facade.delete_account(&id)?;
        self.say("account.removed", &[("id", account.account_id.to_string())])?;
      }

      Command::RefreshAccount => {
        let id = self.ask("prompt.account_id").await?;
        let account = facade.refresh_account_reading(&id)?;
        self.say("account.refreshed", &[
          ("id", account.account_id.to_string()),
          ("reading", format_reading(account.last_reading)),
        ])?;
      }

      Command::Exit => {}
    }
    Ok(())
  }

  // ── Output ────────────────────────────────────────────────────────────────

  fn show_menu<P: RecordStore>(&mut self, state: MenuState, facade: &SessionFacade<P>) -> io::Result<()> {
    let user = facade.session_user().map(|u| u.name).unwrap_or_default();
    self.say(state.title_key(), &[("user", user)])?;
    for (code, command) in state.options() {
      writeln!(self.output, "{code} - {}", self.messages.get(command.label_key()))?;
    }
    Ok(())
  }

  fn say(&mut self, key: &str, args: &[(&str, String)]) -> io::Result<()> {
    let text = self.messages.fill(key, args);
    writeln!(self.output, "{text}")
  }

  fn report_persistence(&mut self, action: &str, report: &PersistenceReport) -> io::Result<()> {
    for failure in &report.failures {
      self.say("system.persistence_warning", &[
        ("action", action.to_owned()),
        ("kind", failure.kind.to_string()),
        ("reason", failure.message.clone()),
      ])?;
    }
    Ok(())
  }

  fn show_alert(&mut self, event: &Event) -> io::Result<()> {
    let time = event.occurred_at.with_timezone(&chrono::Local).format("%H:%M:%S");
    self.say("alert.threshold", &[
      ("time", time.to_string()),
      ("meter", event.subject_id.clone()),
      ("prior", event.prior_reading.map(format_reading).unwrap_or_default()),
    ])
  }

  // ── Input ─────────────────────────────────────────────────────────────────

  async fn ask(&mut self, key: &str) -> anyhow::Result<String> {
    write!(self.output, "{} ", self.messages.get(key))?;
    self.output.flush()?;
    self.next_line().await
  }

  async fn ask_number(&mut self, key: &str) -> anyhow::Result<f64> {
    let raw = self.ask(key).await?;
    raw
      .replace(',', ".")
      .parse()
      .map_err(|_| InputError::NotANumber(raw).into())
  }

  /// The next trimmed input line. Alerts arriving while we wait are printed
  /// as they come.
  async fn next_line(&mut self) -> anyhow::Result<String> {
    loop {
      let alert = tokio::select! {
        line = self.lines.next_line() => {
          return match line.context("reading input")? {
            Some(line) => Ok(line.trim().to_owned()),
            None => Err(InputError::Closed.into()),
          };
        }
        Some(event) = next_alert(&mut self.alerts) => event,
      };
      self.show_alert(&alert)?;
    }
  }
}

async fn next_alert(alerts: &mut Option<UnboundedReceiver<Event>>) -> Option<Event> {
  match alerts {
    Some(rx) => rx.recv().await,
    None => std::future::pending().await,
  }
}

fn is_closed(e: &anyhow::Error) -> bool {
  matches!(e.downcast_ref::<InputError>(), Some(InputError::Closed))
}

fn format_reading(reading: f64) -> String { format!("{reading:.3}") }
