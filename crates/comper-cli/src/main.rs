//! comper: render a chord progression into humanized piano comping

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use comper_core::{Comper, Humanization, PatternLibrary, Progression, Style};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: comper <progression.json> [--config FILE] [--style ID] \
[--humanize LEVEL] [--seed N] [--out FILE] [--print-config]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    progression: Option<PathBuf>,
    config: Option<PathBuf>,
    style: Option<Style>,
    humanization: Option<Humanization>,
    seed: Option<u64>,
    output: Option<PathBuf>,
    print_config: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| args.next().with_context(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--config" => parsed.config = Some(value("--config")?.into()),
            "--out" => parsed.output = Some(value("--out")?.into()),
            "--seed" => {
                let raw = value("--seed")?;
                parsed.seed = Some(raw.parse().with_context(|| format!("invalid seed {raw}"))?);
            }
            "--style" => {
                let raw = value("--style")?;
                parsed.style =
                    Some(Style::from_id(&raw).with_context(|| format!("unknown style {raw}"))?);
            }
            "--humanize" => {
                let raw = value("--humanize")?;
                parsed.humanization = Some(
                    serde_json::from_value(serde_json::Value::String(raw.clone()))
                        .with_context(|| format!("unknown humanization {raw}"))?,
                );
            }
            "--print-config" => parsed.print_config = true,
            flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
            path => {
                if parsed.progression.is_some() {
                    bail!("more than one progression given\n{USAGE}");
                }
                parsed.progression = Some(path.into());
            }
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("comper=info".parse()?),
        )
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let mut config = config::load_config(args.config.as_deref())?;
    if let Some(style) = args.style {
        config.style = style;
    }
    if let Some(humanization) = args.humanization {
        config.humanization = humanization;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    if args.print_config {
        print!("{}", config::render_config(&config)?);
        return Ok(());
    }

    let Some(path) = args.progression else {
        bail!("no progression given\n{USAGE}");
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading progression {}", path.display()))?;
    let progression: Progression = serde_json::from_str(&text)
        .with_context(|| format!("parsing progression {}", path.display()))?;

    let library = Arc::new(PatternLibrary::standard()?);
    let comper = Comper::new(config, library)?;
    let performance = comper.perform(&progression, &mut comper.rng())?;

    let json = serde_json::to_string_pretty(&performance)?;
    match args.output {
        Some(out) => {
            std::fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
            tracing::info!(path = %out.display(), notes = performance.events.len(), "Performance written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_full_args() {
        let parsed = args(&[
            "song.json", "--style", "bebop", "--humanize", "tight", "--seed", "12", "--out", "x.json",
        ])
        .unwrap();
        assert_eq!(parsed.progression, Some(PathBuf::from("song.json")));
        assert_eq!(parsed.style, Some(Style::Bebop));
        assert_eq!(parsed.humanization, Some(Humanization::Tight));
        assert_eq!(parsed.seed, Some(12));
        assert_eq!(parsed.output, Some(PathBuf::from("x.json")));
    }

    #[test]
    fn test_bad_args() {
        assert!(args(&["--style", "polka"]).is_err());
        assert!(args(&["--seed"]).is_err());
        assert!(args(&["--bogus"]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
    }
}
