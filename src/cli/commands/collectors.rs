use crate::collectors::{COLLECTOR_NAMES, Collector, all_factories};
use clap::{Arg, ArgAction, Command};

// clap ids must be 'static and the flag set is built once per process
fn leak(s: String) -> &'static str {
    Box::leak(s.into_boxed_str())
}

/// `--collector.<name>` / `--no-collector.<name>` for every known collector.
pub fn add_collectors_args(mut cmd: Command) -> Command {
    let factories = all_factories();

    for &name in COLLECTOR_NAMES {
        let enabled = factories
            .get(name)
            .is_some_and(|factory| factory().enabled_by_default());

        let enable = leak(format!("collector.{name}"));
        let disable = leak(format!("no-collector.{name}"));
        let state = if enabled { "enabled" } else { "disabled" };

        cmd = cmd
            .arg(
                Arg::new(enable)
                    .long(enable)
                    .help(leak(format!("Enable the {name} collector [default: {state}]")))
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new(disable)
                    .long(disable)
                    .help(leak(format!("Disable the {name} collector")))
                    .action(ArgAction::SetTrue)
                    .overrides_with(enable),
            );
    }

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_exist_for_every_collector() {
        let cmd = add_collectors_args(Command::new("test"));

        for name in COLLECTOR_NAMES {
            let enable = format!("collector.{name}");
            let disable = format!("no-collector.{name}");
            assert!(cmd.get_arguments().any(|a| a.get_id() == enable.as_str()));
            assert!(cmd.get_arguments().any(|a| a.get_id() == disable.as_str()));
        }
    }

    #[test]
    fn test_last_flag_wins() {
        let cmd = add_collectors_args(Command::new("test"));
        let matches = cmd.get_matches_from(vec![
            "test",
            "--no-collector.database",
            "--collector.database",
        ]);

        assert!(matches.get_flag("collector.database"));
        assert!(!matches.get_flag("no-collector.database"));
    }
}
