use gakuen_updater::config::DEFAULT_CONFIG_PATH;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Full update run
    Run,
    /// Save one screenshot and print how it classifies
    Screenshot,
}

#[derive(Debug, PartialEq)]
pub struct Args {
    pub mode: Mode,
    pub config_path: PathBuf,
    pub debug: bool,
}

/// What the command line asked for besides a normal start.
#[derive(Debug, PartialEq)]
pub enum Exit {
    Help,
    Version,
    Invalid(String),
}

impl Exit {
    /// Process exit code: a bad command line counts as a configuration error.
    pub fn code(&self) -> i32 {
        match self {
            Exit::Help | Exit::Version => 0,
            Exit::Invalid(_) => 2,
        }
    }
}

impl Args {
    /// Parse the process arguments. On `Err` help, version or the error has
    /// been printed and the program should exit with the carried code.
    pub fn parse() -> Result<Self, i32> {
        Self::parse_from(env::args().skip(1)).map_err(|exit| {
            match &exit {
                Exit::Help => print_help(),
                Exit::Version => println!("{}", version_line()),
                Exit::Invalid(msg) => {
                    eprintln!("❌ {}", msg);
                    print_help();
                }
            }
            exit.code()
        })
    }

    pub fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self, Exit> {
        let mut mode = Mode::Run;
        let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        let mut debug = false;

        for arg in args {
            if arg == "--help" || arg == "-h" {
                return Err(Exit::Help);
            } else if arg == "--version" || arg == "-v" {
                return Err(Exit::Version);
            } else if arg == "--debug" {
                debug = true;
            } else if arg == "--screenshot" || arg == "-s" {
                mode = Mode::Screenshot;
            } else if let Some(path) = arg.strip_prefix("--config=") {
                if path.is_empty() {
                    return Err(Exit::Invalid("--config needs a path".to_string()));
                }
                config_path = PathBuf::from(path);
            } else {
                return Err(Exit::Invalid(format!("Unknown argument: {}", arg)));
            }
        }

        Ok(Args {
            mode,
            config_path,
            debug,
        })
    }
}

pub fn version_line() -> String {
    format!(
        "Gakuen Updater v{} ({})",
        env!("UPDATER_VERSION"),
        env!("UPDATER_BUILD_YEAR")
    )
}

fn print_help() {
    println!("🤖 {}", version_line());
    println!();
    println!("USAGE:");
    println!("    gakuen-updater [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    (no flags)          Run the update using ./config.yaml");
    println!("    --config=PATH       Read the run configuration from PATH");
    println!("    --screenshot, -s    Save one screenshot and print its classification");
    println!("    --debug             Log every poll and match score");
    println!("    --help, -h          Show this help message");
    println!("    --version, -v       Show version information");
    println!();
    println!("Exit codes: 0 done, 2 config, 3 assets, 4 adb, 5 stage timeout,");
    println!("            6 unexpected device, 130 stopped");
    println!();
    println!("EXAMPLES:");
    println!("    gakuen-updater");
    println!("    gakuen-updater --config=/etc/gakuen/config.yaml --debug");
    println!("    gakuen-updater --screenshot");
}
