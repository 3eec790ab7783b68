use clap::Parser;
use reqwest::{Client, RequestBuilder};
use sse_probe::{parse_header, Error, Probe, ProbeConfig, RequestBuilderExt, DEFAULT_URL};
use std::io;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit status for unusable command-line configuration, same as clap's usage errors.
const CONFIG_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "sse-probe",
    version,
    about = "Connect to a Server-Sent Events endpoint and print what arrives"
)]
struct Cli {
    /// SSE endpoint to connect to
    #[arg(env = "SSE_PROBE_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Seconds to listen before closing the connection
    #[arg(short, long, env = "SSE_PROBE_DURATION", default_value_t = 10)]
    duration: u64,

    /// Extra request header, `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Named event type to report (repeatable, replaces ping and init)
    #[arg(short, long = "event", value_name = "NAME")]
    events: Vec<String>,

    /// Log lifecycle diagnostics at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<ProbeConfig, Error> {
        let mut config = ProbeConfig::new(self.url);
        config.duration = Duration::from_secs(self.duration);
        config.headers = self
            .headers
            .iter()
            .map(|raw| parse_header(raw))
            .collect::<Result<_, _>>()?;
        if !self.events.is_empty() {
            config.channels = self.events;
        }
        config.parsed_url()?;
        config.header_map()?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
}

fn prepare(cli: Cli) -> Result<(ProbeConfig, RequestBuilder), ExitCode> {
    let prepared = cli.into_config().and_then(|config| {
        let request = config.request(&Client::new())?;
        Ok((config, request))
    });
    prepared.map_err(|err| {
        eprintln!("error: {}", err);
        ExitCode::from(CONFIG_ERROR)
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (config, request) = match prepare(cli) {
        Ok(prepared) => prepared,
        Err(code) => return code,
    };

    let source = request.eventsource();
    let mut probe = Probe::new(config, source, io::stdout(), io::stderr());
    match probe.run(interrupted()).await {
        Ok(reason) => ExitCode::from(reason.exit_code()),
        Err(err) => {
            tracing::error!("probe aborted: {}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn config(args: &[&str]) -> Result<ProbeConfig, Error> {
        let argv = std::iter::once("sse-probe").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap().into_config()
    }

    #[test]
    fn defaults_match_library_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config, ProbeConfig::default());
    }

    #[test]
    fn url_and_duration() {
        let config = config(&["http://127.0.0.1:9000/events", "--duration", "3"]).unwrap();
        assert_eq!(config.url, "http://127.0.0.1:9000/events");
        assert_eq!(config.duration, Duration::from_secs(3));

        let config = self::config(&["-d", "0"]).unwrap();
        assert_eq!(config.duration, Duration::ZERO);
    }

    #[test]
    fn events_replace_default_channels() {
        let config = config(&["-e", "tick", "--event", "done"]).unwrap();
        assert_eq!(config.channels, ["tick", "done"]);
        assert!(!config.is_channel("ping"));
    }

    #[test]
    fn headers_are_parsed() {
        let config = config(&["-H", "Authorization: Bearer abc", "--header", "X-Trace:1"]).unwrap();
        assert_eq!(
            config.headers,
            [
                ("Authorization".to_owned(), "Bearer abc".to_owned()),
                ("X-Trace".to_owned(), "1".to_owned()),
            ]
        );
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert!(matches!(
            config(&["not a url"]),
            Err(Error::InvalidUrl { .. })
        ));
        assert!(matches!(
            config(&["-H", "no-colon"]),
            Err(Error::InvalidHeader(_))
        ));
        assert!(matches!(
            config(&["-H", "bad name: 1"]),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn invalid_configuration_exits_with_usage_status() {
        for args in [&["not a url"][..], &["-H", "no-colon"][..]] {
            let argv = std::iter::once("sse-probe").chain(args.iter().copied());
            let cli = Cli::try_parse_from(argv).unwrap();
            assert_eq!(prepare(cli).unwrap_err(), ExitCode::from(CONFIG_ERROR));
        }
    }

    #[test]
    fn configuration_errors_share_clap_usage_status() {
        let err = Cli::try_parse_from(["sse-probe", "--duration", "soon"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert_eq!(err.exit_code(), i32::from(CONFIG_ERROR));
    }
}
