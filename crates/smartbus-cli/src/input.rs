//! Shell command parsing.

use anyhow::{bail, Result};
use smartbus_core::faults::FaultFilter;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    Login(Option<String>),
    Logout,
    Register,
    Status,
    History,
    RechargeMobile(String),
    RechargePaypal(String),
    Routes(Option<String>),
    Route(String),
    Bus(String),
    Faults(FaultFilter),
    Fault(String),
    Resolve(String),
    DarkMode,
    Cache,
    Version,
}

pub const HELP: &str = "\
Commands:
  login [username]           Log in (prompts for the password)
  logout                     End the session
  register                   Create an account
  status                     Show user, balance and session time left
  history                    List top-ups, newest first
  recharge mobile <amount>   Top up in RD$ with mobile payment
  recharge paypal <amount>   Top up RD$ amount, charged in USD to PayPal
  routes [search]            List routes, optionally filtered
  route <id>                 Route details and its buses
  bus <id>                   Live bus details
  faults [filter]            Admin: fault board (pending|high|medium|low|completed)
  fault <id>                 Admin: fault details
  resolve <id>               Admin: mark a fault completed
  dark-mode                  Toggle dark mode
  cache                      Offline cache status
  version                    Show the app version
  help                       This list
  quit                       Exit";

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let arg = |usage: &str| -> Result<String> {
        match rest.first() {
            Some(value) => Ok((*value).to_string()),
            None => bail!("Usage: {}", usage),
        }
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        "login" => Command::Login(rest.first().map(|s| s.to_string())),
        "logout" => Command::Logout,
        "register" => Command::Register,
        "status" => Command::Status,
        "history" => Command::History,
        "recharge" => match rest.as_slice() {
            [method, amount] if method.eq_ignore_ascii_case("mobile") => {
                Command::RechargeMobile(amount.to_string())
            }
            [method, amount] if method.eq_ignore_ascii_case("paypal") => {
                Command::RechargePaypal(amount.to_string())
            }
            _ => bail!("Usage: recharge <mobile|paypal> <amount>"),
        },
        "routes" => {
            let query = rest.join(" ");
            Command::Routes(if query.is_empty() { None } else { Some(query) })
        }
        "route" => Command::Route(arg("route <id>")?),
        "bus" => Command::Bus(arg("bus <id>")?),
        "faults" => match rest.first() {
            Some(filter) => Command::Faults(filter.parse()?),
            None => Command::Faults(FaultFilter::default()),
        },
        "fault" => Command::Fault(arg("fault <id>")?),
        "resolve" => Command::Resolve(arg("resolve <id>")?),
        "dark-mode" | "darkmode" => Command::DarkMode,
        "cache" => Command::Cache,
        "version" => Command::Version,
        other => bail!("Unknown command: {} (try 'help')", other),
    };
    Ok(Some(command))
}
