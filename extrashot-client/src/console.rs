//! Line-oriented operator console.

use anyhow::{Context, Result};
use async_trait::async_trait;
use extrashot_core::control_service::ConfirmPrompt;
use extrashot_core::credentials::CredentialChangeForm;
use extrashot_core::ptz::{Direction, Exposure, Preset, WhiteBalance, ZoomDirection};
use extrashot_core::ptz_dispatcher::Dispatch;
use extrashot_core::session_controller::StopOutcome;
use extrashot_core::session_state::{SessionState, ViewerSession};
use extrashot_core::{ControlError, OperatorSession};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

pub const MAX_HOLD: Duration = Duration::from_secs(10);

const HELP: &str = "\
sources | refresh [secs] | view <name> | stop | status
move <dir> <ms> | zoom <in|out> <ms> | speed <0.1..1.0>
preset <1-6> | store <1-6> | focus | wb <auto|indoor|outdoor|oneshot|manual r b>
exposure <auto|level> | output start [name] | output stop | devices
ips | ip add <ip> | ip rm <ip> | password | health | logout | quit
directions: up down left right up-left up-right down-left down-right";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Sources,
    Refresh(Option<u64>),
    View(String),
    Stop,
    Status,
    Move { direction: Direction, hold: Duration },
    Zoom { direction: ZoomDirection, hold: Duration },
    Speed(f32),
    Preset(u8),
    Store(u8),
    Focus,
    WhiteBalance(WhiteBalance),
    Exposure(Exposure),
    OutputStart(Option<String>),
    OutputStop,
    Devices,
    Ips,
    IpAdd(String),
    IpRemove(String),
    Password,
    Health,
    Logout,
    Quit,
}

/// How a console run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Quit,
    LoggedOut,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".to_string());
    };
    let rest: Vec<&str> = words.collect();
    let command = match (head, rest.as_slice()) {
        ("help" | "?", []) => Command::Help,
        ("sources", []) => Command::Sources,
        ("refresh", []) => Command::Refresh(None),
        ("refresh", [secs]) => Command::Refresh(Some(number(secs, "timeout")?)),
        ("view", [_, ..]) => Command::View(rest.join(" ")),
        ("stop", []) => Command::Stop,
        ("status", []) => Command::Status,
        ("move", [direction, ms]) => Command::Move {
            direction: direction
                .parse()
                .map_err(|_| format!("unknown direction {direction}"))?,
            hold: hold(ms)?,
        },
        ("zoom", [direction, ms]) => Command::Zoom {
            direction: direction
                .parse()
                .map_err(|_| format!("zoom direction must be in or out, got {direction}"))?,
            hold: hold(ms)?,
        },
        ("speed", [value]) => Command::Speed(number(value, "speed")?),
        ("preset", [n]) => Command::Preset(number(n, "preset")?),
        ("store", [n]) => Command::Store(number(n, "preset")?),
        ("focus", []) => Command::Focus,
        ("wb", [mode]) => Command::WhiteBalance(match *mode {
            "auto" => WhiteBalance::Auto,
            "indoor" => WhiteBalance::Indoor,
            "outdoor" => WhiteBalance::Outdoor,
            "oneshot" => WhiteBalance::OneShot,
            other => return Err(format!("unknown white balance mode {other}")),
        }),
        ("wb", ["manual", red, blue]) => Command::WhiteBalance(WhiteBalance::Manual {
            red: number(red, "red gain")?,
            blue: number(blue, "blue gain")?,
        }),
        ("exposure", ["auto"]) => Command::Exposure(Exposure::Auto),
        ("exposure", [level]) => Command::Exposure(Exposure::Manual {
            level: number(level, "exposure level")?,
        }),
        ("output", ["start"]) => Command::OutputStart(None),
        ("output", ["start", _, ..]) => Command::OutputStart(Some(rest[1..].join(" "))),
        ("output", ["stop"]) => Command::OutputStop,
        ("devices", []) => Command::Devices,
        ("ips", []) => Command::Ips,
        ("ip", ["add", ip]) => Command::IpAdd(ip.to_string()),
        ("ip", ["rm", ip]) => Command::IpRemove(ip.to_string()),
        ("password", []) => Command::Password,
        ("health", []) => Command::Health,
        ("logout", []) => Command::Logout,
        ("quit" | "exit", []) => Command::Quit,
        _ => return Err(format!("unknown command: {}", line.trim())),
    };
    Ok(command)
}

fn number<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, String> {
    raw.parse().map_err(|_| format!("invalid {what}: {raw}"))
}

fn hold(raw: &str) -> Result<Duration, String> {
    let hold = Duration::from_millis(number(raw, "hold time")?);
    if hold > MAX_HOLD {
        return Err(format!("hold time is limited to {} ms", MAX_HOLD.as_millis()));
    }
    Ok(hold)
}

/// Shared line source for commands and prompts.
pub struct Input {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Input {
    pub fn stdin() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// `None` at end of input.
    pub async fn read_line(&self, prompt: &str) -> Result<Option<String>> {
        print!("{prompt}");
        std::io::stdout().flush().context("stdout flush failed")?;
        let mut lines = self.lines.lock().await;
        lines.next_line().await.context("stdin read failed")
    }
}

#[async_trait]
impl ConfirmPrompt for Input {
    async fn confirm(&self, question: &str) -> bool {
        match self.read_line(&format!("{question} [y/N] ")).await {
            Ok(Some(answer)) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            _ => false,
        }
    }
}

pub async fn run(session: &OperatorSession, input: &Input) -> Result<Exit> {
    println!("type `help` for commands");
    loop {
        while let Some(alert) = session.try_recv_alert() {
            println!("! {alert}");
        }
        let Some(line) = input.read_line("> ").await? else {
            return Ok(Exit::Quit);
        };
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        match command {
            Command::Quit => return Ok(Exit::Quit),
            Command::Logout => {
                session.logout().await;
                println!("logged out");
                return Ok(Exit::LoggedOut);
            }
            command => {
                if let Err(err) = execute(session, input, command).await {
                    println!("error: {err}");
                }
            }
        }
    }
}

async fn execute(
    session: &OperatorSession,
    input: &Input,
    command: Command,
) -> Result<(), ControlError> {
    let dispatcher = session.dispatcher();
    match command {
        Command::Help => println!("{HELP}"),
        Command::Sources => print_sources(session),
        Command::Refresh(secs) => {
            println!("scanning...");
            session.refresh_sources(secs).await?;
            print_sources(session);
        }
        Command::View(name) => {
            let action = session.select_source(&name).await?;
            println!("{action:?} viewer on {name}");
        }
        Command::Stop => match session.stop_viewer().await? {
            StopOutcome::Stopped => println!("viewer stopped"),
            StopOutcome::AlreadyStopped => println!("viewer is not running"),
        },
        Command::Status => print_status(session),
        Command::Move { direction, hold } => {
            report(dispatcher.press(direction).await);
            tokio::time::sleep(hold).await;
            dispatcher.release().await?;
        }
        Command::Zoom { direction, hold } => {
            let pressed = dispatcher.zoom_press(direction).await;
            if let Ok(dispatch) = pressed {
                report(dispatch);
                tokio::time::sleep(hold).await;
            }
            let released = dispatcher.zoom_release().await;
            pressed?;
            released?;
        }
        Command::Speed(value) => {
            let factor = dispatcher.set_speed_factor(value);
            println!("speed {}%", factor.percent());
        }
        Command::Preset(n) => report(dispatcher.recall_preset(Preset::new(n)?).await?),
        Command::Store(n) => report(dispatcher.store_preset(Preset::new(n)?, input).await?),
        Command::Focus => report(dispatcher.auto_focus().await?),
        Command::WhiteBalance(mode) => report(dispatcher.white_balance(mode).await?),
        Command::Exposure(exposure) => report(dispatcher.exposure(exposure).await?),
        Command::OutputStart(name) => {
            session.start_default_output(name).await?;
            print_status(session);
        }
        Command::OutputStop => match session.stop_output().await? {
            StopOutcome::Stopped => println!("output stopped"),
            StopOutcome::AlreadyStopped => println!("output is not running"),
        },
        Command::Devices => {
            let devices = session.sessions().capture_devices().await?;
            if devices.is_empty() {
                println!("no camera devices");
            }
            for device in devices {
                println!("{}  {} ({:?})", device.path, device.name, device.kind);
            }
        }
        Command::Ips => print_ips(&session.catalog().load_extra_ips().await?),
        Command::IpAdd(ip) => print_ips(&session.catalog().add_extra_ip(&ip).await?),
        Command::IpRemove(ip) => print_ips(&session.catalog().remove_extra_ip(&ip).await?),
        Command::Password => {
            let Some(form) = read_credential_form(input).await else {
                return Ok(());
            };
            session.change_credentials(form).await?;
            println!("credentials updated");
        }
        Command::Health => {
            let health = session.health().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&health).unwrap_or_else(|_| health.to_string())
            );
        }
        Command::Logout | Command::Quit => {}
    }
    Ok(())
}

async fn read_credential_form(input: &Input) -> Option<CredentialChangeForm> {
    let mut answers = Vec::with_capacity(4);
    for prompt in [
        "current password: ",
        "new username (blank keeps): ",
        "new password (blank keeps): ",
        "confirm new password: ",
    ] {
        answers.push(input.read_line(prompt).await.ok().flatten()?);
    }
    let mut answers = answers.into_iter();
    Some(CredentialChangeForm {
        current_password: answers.next()?,
        new_username: answers.next()?.trim().to_string(),
        new_password: answers.next()?,
        confirm_password: answers.next()?,
    })
}

fn report(dispatch: Dispatch) {
    match dispatch {
        Dispatch::Sent => {}
        Dispatch::Disabled => println!("PTZ is available while the viewer is running"),
        Dispatch::Ignored => println!("already active"),
        Dispatch::Declined => println!("cancelled"),
    }
}

fn print_sources(session: &OperatorSession) {
    let sources = session.sources();
    if sources.is_empty() {
        println!("no sources");
    }
    for source in sources {
        match source.address {
            Some(address) => println!("{}  ({})", source.name, address),
            None => println!("{}", source.name),
        }
    }
}

fn print_ips(ips: &[String]) {
    if ips.is_empty() {
        println!("no extra IPs");
    } else {
        println!("{}", ips.join(", "));
    }
}

fn viewer_line(viewer: &ViewerSession) -> String {
    match (viewer.state(), viewer.current_source()) {
        (SessionState::Running, Some(source)) => format!("viewer: running {source}"),
        (SessionState::Running, None) => "viewer: running (source unknown)".to_string(),
        (SessionState::Stopped, _) => "viewer: stopped".to_string(),
    }
}

fn print_status(session: &OperatorSession) {
    println!("{}", viewer_line(&session.sessions().viewer()));
    let output = session.sessions().output();
    if output.is_running() {
        println!(
            "output: running {} from {} at {}",
            output.name().unwrap_or("-"),
            output.device().unwrap_or("-"),
            output.resolution().unwrap_or("-")
        );
    } else {
        println!("output: stopped");
    }
    println!("speed: {}%", session.dispatcher().speed_factor().percent());
}
