//! Tests for CLI command parsing and validation

#[cfg(test)]
mod tests {
    use clap::Parser;
    use std::path::PathBuf;

    use crate::config::UiMode;
    use crate::{Cli, Commands};

    #[test]
    fn test_cli_parsing_no_args() {
        let args = vec!["ebdeploy"];
        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok());

        let cli = cli.unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
        assert!(cli.ui.is_none());
        assert!(cli.answers.is_empty());
    }

    #[test]
    fn test_cli_parsing_verbose_flag() {
        let args = vec!["ebdeploy", "--verbose"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_parsing_config_flag() {
        let args = vec!["ebdeploy", "--config", "/path/to/ebdeploy.toml"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/ebdeploy.toml")));
    }

    #[test]
    fn test_cli_parsing_deploy_command_with_answers() {
        let args = vec![
            "ebdeploy",
            "deploy",
            "--answer",
            "GITHUB_USER_NAME=octo",
            "-a",
            "GITHUB_REPO=myapp",
            "--work-dir",
            "/tmp/ebdeploy",
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        assert!(matches!(cli.command, Some(Commands::Deploy)));
        assert_eq!(cli.answers, vec!["GITHUB_USER_NAME=octo", "GITHUB_REPO=myapp"]);
        assert_eq!(cli.work_dir, Some(PathBuf::from("/tmp/ebdeploy")));
    }

    #[test]
    fn test_cli_parsing_ui_mode() {
        let cli = Cli::try_parse_from(vec!["ebdeploy", "--ui", "daemon"]).unwrap();
        assert_eq!(cli.ui, Some(UiMode::Daemon));

        let cli = Cli::try_parse_from(vec!["ebdeploy", "--ui", "terminal"]).unwrap();
        assert_eq!(cli.ui, Some(UiMode::Terminal));
    }

    #[test]
    fn test_cli_parsing_regions_and_config_commands() {
        let cli = Cli::try_parse_from(vec!["ebdeploy", "regions"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Regions)));

        let cli = Cli::try_parse_from(vec!["ebdeploy", "config", "-c", "custom.toml"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Config)));
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
    }

    #[test]
    fn test_cli_parsing_invalid_command() {
        let args = vec!["ebdeploy", "invalid-command"];
        let cli = Cli::try_parse_from(args);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_parsing_invalid_ui_mode() {
        let args = vec!["ebdeploy", "--ui", "slack"];
        let cli = Cli::try_parse_from(args);
        assert!(cli.is_err());
    }
}
