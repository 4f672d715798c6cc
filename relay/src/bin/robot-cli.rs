use clap::{ArgMatches, Command, value_parser};
use std::io::Write;
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::time::Duration;

use relay::command::{DEFAULT_PORT, WheelCommand, agent_address};

/// Interval between repeated frames while driving.
const KEEPALIVE: Duration = Duration::from_millis(200);

fn target_args(cmd: Command) -> Command {
    cmd.arg(
        clap::arg!(-a --agent <ID> "Robot agent id (0-19), address is derived from it")
            .value_parser(value_parser!(u8))
            .required_unless_present("ip")
            .conflicts_with("ip"),
    )
    .arg(clap::arg!(-i --ip <ADDR> "Robot address").value_parser(value_parser!(IpAddr)))
}

fn cli() -> Command {
    Command::new("robot-cli")
        .about("Sends wheel velocity commands to a robot through its WiFi serial relay.")
        .arg(
            clap::arg!(-p --port <PORT> "Relay TCP port")
                .value_parser(value_parser!(u16))
                .default_value("9090")
                .global(true),
        )
        .arg(
            clap::arg!(-t --timeout <SECS> "Connect timeout in seconds")
                .value_parser(value_parser!(f64))
                .default_value("2")
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(target_args(
            Command::new("wheels")
                .about("Set both wheel speeds in rpm, saturated to +-400")
                .arg(
                    clap::arg!(-l --left <RPM> "Left wheel speed")
                        .value_parser(value_parser!(f32))
                        .allow_negative_numbers(true)
                        .required(true),
                )
                .arg(
                    clap::arg!(-r --right <RPM> "Right wheel speed")
                        .value_parser(value_parser!(f32))
                        .allow_negative_numbers(true)
                        .required(true),
                )
                .arg(
                    clap::arg!(-d --duration <SECS> "How long to keep driving before stopping")
                        .value_parser(value_parser!(f64))
                        .default_value("1"),
                ),
        ))
        .subcommand(target_args(Command::new("stop").about("Stop both wheels")))
}

fn resolve(matches: &ArgMatches) -> Result<SocketAddr, String> {
    let port = *matches.get_one::<u16>("port").unwrap_or(&DEFAULT_PORT);
    if let Some(ip) = matches.get_one::<IpAddr>("ip") {
        return Ok(SocketAddr::new(*ip, port));
    }
    let Some(id) = matches.get_one::<u8>("agent") else {
        return Err("either --agent or --ip is required".into());
    };
    let ip = agent_address(*id).map_err(|e| e.to_string())?;
    Ok(SocketAddr::new(IpAddr::V4(ip), port))
}

/// Seconds given on the command line, raised to at least `min`.
fn seconds(flag: &str, secs: f64, min: f64) -> Result<Duration, String> {
    Duration::try_from_secs_f64(secs.max(min))
        .map_err(|_| format!("--{flag} must be a finite number of seconds, got {secs}"))
}

/// The frame to send and how long to keep sending it.
fn plan(name: &str, sub: &ArgMatches) -> Result<(WheelCommand, Duration), String> {
    match name {
        "wheels" => {
            let left = sub.get_one::<f32>("left");
            let right = sub.get_one::<f32>("right");
            let (Some(left), Some(right)) = (left, right) else {
                return Err("both --left and --right are required".into());
            };
            let (cmd, sat) = WheelCommand::saturated(*left, *right);
            if sat.left {
                eprintln!("Warning: Left wheel speed saturated to {} rpm", cmd.left_rpm);
            }
            if sat.right {
                eprintln!("Warning: Right wheel speed saturated to {} rpm", cmd.right_rpm);
            }
            let secs = *sub.get_one::<f64>("duration").unwrap_or(&1.0);
            Ok((cmd, seconds("duration", secs, 0.0)?))
        }
        "stop" => Ok((WheelCommand::STOP, Duration::ZERO)),
        other => Err(format!("unknown command `{other}`")),
    }
}

fn send<W: Write>(out: &mut W, cmd: &WheelCommand) -> Result<(), String> {
    out.write_all(&cmd.encode()).map_err(|e| format!("TCP send failed: {e}"))
}

/// Sends `cmd` every `KEEPALIVE` until `duration` has passed, once at least.
fn drive<W: Write>(
    out: &mut W,
    cmd: &WheelCommand,
    duration: Duration,
    mut pause: impl FnMut(Duration),
) -> Result<(), String> {
    let mut elapsed = Duration::ZERO;
    loop {
        send(out, cmd)?;
        if elapsed >= duration {
            return Ok(());
        }
        let step = KEEPALIVE.min(duration - elapsed);
        pause(step);
        elapsed += step;
    }
}

/// Drives, then leaves the robot stopped whatever happened while driving.
///
/// The first error is returned.
fn session<W: Write>(
    out: &mut W,
    cmd: &WheelCommand,
    duration: Duration,
    pause: impl FnMut(Duration),
) -> Result<(), String> {
    let driven = drive(out, cmd, duration, pause);
    if *cmd == WheelCommand::STOP {
        return driven;
    }
    let stopped = send(out, &WheelCommand::STOP);
    if let (Err(_), Err(e)) = (&driven, &stopped) {
        eprintln!("Error: {e}");
    }
    driven.and(stopped)
}

fn main() {
    let matches = cli().get_matches();

    let Some((name, sub)) = matches.subcommand() else {
        eprintln!("Error: No command given");
        std::process::exit(2);
    };

    let (cmd, duration) = match plan(name, sub) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let addr = match resolve(sub) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let timeout = *sub.get_one::<f64>("timeout").unwrap_or(&2.0);
    let timeout = match seconds("timeout", timeout, 0.1) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let mut stream = match TcpStream::connect_timeout(&addr, timeout) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: could not connect to the robot at {addr}: {e}");
            std::process::exit(1);
        }
    };

    println!("Sending {cmd:?} to {addr}");
    let mut status = 0;
    if let Err(e) = session(&mut stream, &cmd, duration, std::thread::sleep) {
        eprintln!("Error: {e}");
        status = 1;
    }
    let _ = stream.shutdown(std::net::Shutdown::Both);
    std::process::exit(status);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::net::Ipv4Addr;

    const FRAME: usize = relay::command::FRAME_LEN;

    fn frames(out: &[u8]) -> Vec<[u8; FRAME]> {
        assert_eq!(out.len() % FRAME, 0);
        out.chunks(FRAME).map(|c| c.try_into().unwrap()).collect()
    }

    fn sub(line: &str) -> (String, ArgMatches) {
        let args = ["robot-cli"].into_iter().chain(line.split_whitespace());
        let m = cli().try_get_matches_from(args).unwrap();
        let (name, sub) = m.subcommand().unwrap();
        (name.to_string(), sub.clone())
    }

    /// Accepts whole buffers, failing the write with index `fail_on`.
    struct FlakyLink {
        out: Vec<u8>,
        writes: usize,
        fail_on: usize,
    }

    impl Write for FlakyLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let call = self.writes;
            self.writes += 1;
            if call == self.fail_on {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link dropped"));
            }
            self.out.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn wheels_repeat_every_200ms_then_stop() {
        let cmd = WheelCommand::new(100.0, -100.0);
        let mut out = Vec::new();
        let mut pauses = Vec::new();

        session(&mut out, &cmd, Duration::from_secs(1), |d| pauses.push(d)).unwrap();

        assert_eq!(pauses, vec![KEEPALIVE; 5]);
        let sent = frames(&out);
        assert_eq!(sent.len(), 7);
        assert!(sent[..6].iter().all(|f| *f == cmd.encode()));
        assert_eq!(sent[6], WheelCommand::STOP.encode());
    }

    #[test]
    fn short_duration_sends_once_with_a_short_pause() {
        let cmd = WheelCommand::new(10.0, 10.0);
        let mut out = Vec::new();
        let mut pauses = Vec::new();

        session(&mut out, &cmd, Duration::from_millis(50), |d| pauses.push(d)).unwrap();

        assert_eq!(pauses, vec![Duration::from_millis(50)]);
        let expected = vec![cmd.encode(), cmd.encode(), WheelCommand::STOP.encode()];
        assert_eq!(frames(&out), expected);
    }

    #[test]
    fn stop_sends_exactly_one_stop_frame() {
        let mut out = Vec::new();

        session(&mut out, &WheelCommand::STOP, Duration::ZERO, |_| {
            panic!("stop never waits")
        })
        .unwrap();

        assert_eq!(frames(&out), vec![WheelCommand::STOP.encode()]);
    }

    #[test]
    fn send_error_mid_drive_still_stops_the_robot() {
        let cmd = WheelCommand::new(200.0, 200.0);
        let mut link = FlakyLink {
            out: Vec::new(),
            writes: 0,
            fail_on: 2,
        };

        let err = session(&mut link, &cmd, Duration::from_secs(1), |_| {}).unwrap_err();

        assert!(err.contains("link dropped"), "{err}");
        let sent = frames(&link.out);
        assert_eq!(sent, vec![cmd.encode(), cmd.encode(), WheelCommand::STOP.encode()]);
    }

    #[test]
    fn resolves_explicit_ip_and_port() {
        let (_, m) = sub("stop --ip 10.0.0.7 --port 2323");
        assert_eq!(resolve(&m), Ok("10.0.0.7:2323".parse().unwrap()));
    }

    #[test]
    fn resolves_agent_id_to_lab_address() {
        let (name, m) = sub("wheels --agent 3 --left 10 --right -10");
        assert_eq!(
            resolve(&m),
            Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 50, 103)), 9090))
        );

        let (cmd, duration) = plan(&name, &m).unwrap();
        assert_eq!(cmd, WheelCommand::new(10.0, -10.0));
        assert_eq!(duration, Duration::from_secs(1));
    }

    #[test]
    fn agent_out_of_range_is_an_error() {
        let (_, m) = sub("stop --agent 20");
        assert!(resolve(&m).is_err());
    }

    #[test]
    fn target_is_required_and_exclusive() {
        assert!(cli().try_get_matches_from(["robot-cli", "stop"]).is_err());
        assert!(
            cli()
                .try_get_matches_from(["robot-cli", "stop", "--agent", "1", "--ip", "10.0.0.1"])
                .is_err()
        );
    }

    #[test]
    fn wheel_speeds_are_saturated() {
        let (name, m) = sub("wheels -a 0 -l 900 -r -900 -d 0");
        let (cmd, duration) = plan(&name, &m).unwrap();
        assert_eq!(cmd, WheelCommand::new(400.0, -400.0));
        assert_eq!(duration, Duration::ZERO);
    }

    #[test]
    fn unrepresentable_seconds_are_rejected() {
        assert!(seconds("duration", f64::INFINITY, 0.0).is_err());
        assert!(seconds("timeout", 1e30, 0.1).is_err());

        let (name, m) = sub("wheels -a 0 -l 1 -r 1 --duration inf");
        assert!(plan(&name, &m).is_err());
    }

    #[test]
    fn small_or_negative_seconds_are_raised_to_the_minimum() {
        assert_eq!(seconds("duration", -3.0, 0.0), Ok(Duration::ZERO));
        assert_eq!(seconds("timeout", 0.0, 0.1), Ok(Duration::from_millis(100)));
        assert_eq!(seconds("duration", 0.5, 0.0), Ok(Duration::from_millis(500)));
    }
}
