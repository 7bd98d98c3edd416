// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod pages;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use std::env;
use std::path::PathBuf;

const DEFAULT_RESOURCE: &str = "products";

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `roastery --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    runtime::init_logging(&config)?;

    let resource = options.resource.as_deref().unwrap_or(DEFAULT_RESOURCE);
    let mut session = if options.demo {
        runtime::demo_session(config.widget_defaults()?)
    } else {
        runtime::live_session(&config, resource).with_context(|| {
            format!(
                "start live session for {resource}; fix [server] in {} or run with --demo",
                options.config_path.display()
            )
        })?
    };
    if options.check_only {
        return Ok(());
    }

    tracing::info!(demo = options.demo, resource, "starting terminal UI");
    roastery_tui::run_app(&mut session.page, session.transport)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    demo: bool,
    resource: Option<String>,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        demo: false,
        resource: None,
        check_only: false,
        show_help: false,
    };

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let flag = arg.as_ref();
        match flag {
            "--config" => options.config_path = PathBuf::from(flag_value(flag, &mut args)?),
            "--resource" => options.resource = Some(flag_value(flag, &mut args)?),
            "--print-config-path" => options.print_config_path = true,
            "--print-example-config" => options.print_example = true,
            "--demo" => options.demo = true,
            "--check" => options.check_only = true,
            "--help" | "-h" => options.show_help = true,
            unknown => bail!("unknown argument {unknown:?}; run with --help to see supported options"),
        }
    }

    if options.demo && options.resource.is_some() {
        bail!("--resource only applies to live mode; drop it or drop --demo");
    }
    Ok(options)
}

fn flag_value<S: AsRef<str>>(flag: &str, args: &mut impl Iterator<Item = S>) -> Result<String> {
    let hint = match flag {
        "--config" => "a file path",
        _ => "a name, for example `--resource products`",
    };
    args.next()
        .map(|value| value.as_ref().to_owned())
        .ok_or_else(|| anyhow!("{flag} requires {hint}"))
}

fn print_help() {
    println!("roastery");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Launch the offline demo catalog");
    println!("  --resource <name>        List this API resource (default: products)");
    println!("  --check                  Validate config and load the page, then exit");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/roastery-config.toml")
    }

    #[test]
    fn no_arguments_means_live_mode_with_default_config() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_example: false,
                demo: false,
                resource: None,
                check_only: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn flag_values_are_taken_from_the_next_argument() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/srv/roastery/config.toml", "--resource", "materials"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/srv/roastery/config.toml"));
        assert_eq!(options.resource.as_deref(), Some("materials"));
        assert!(!options.demo);
        Ok(())
    }

    #[test]
    fn flags_without_values_are_rejected() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));

        let error = parse_cli_args(vec!["--resource"], default_options_path())
            .expect_err("missing resource should fail");
        assert!(error.to_string().contains("--resource requires a name"));
    }

    #[test]
    fn unknown_arguments_point_at_help() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn boolean_flags_combine() -> Result<()> {
        let options = parse_cli_args(
            vec!["--demo", "--print-example-config", "--check"],
            default_options_path(),
        )?;
        assert!(options.demo);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.print_config_path);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn resource_conflicts_with_demo() {
        let error = parse_cli_args(
            vec!["--demo", "--resource", "materials"],
            default_options_path(),
        )
        .expect_err("demo with resource should fail");
        assert!(error.to_string().contains("only applies to live mode"));
    }

    #[test]
    fn help_has_a_short_form() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }
}
