use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::models::DEFAULT_TOP_K;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// YAML settings file. `APP_*` environment variables take precedence.
    #[clap(long, global = true, env = "APP_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP service
    Serve {
        /// Bind address (overrides APP_HOST)
        #[clap(long)]
        host: Option<String>,

        /// Bind port (overrides APP_PORT)
        #[clap(short, long)]
        port: Option<u16>,
    },

    /// Rank products against queries once and print the result as JSON
    Search {
        /// Query text. Repeat for several queries.
        #[clap(short, long = "text")]
        text: Vec<String>,

        /// Product description. Repeat for several products.
        #[clap(short, long = "product")]
        products: Vec<String>,

        /// Matches to return per query
        #[clap(short = 'k', long, default_value_t = DEFAULT_TOP_K, allow_negative_numbers = true)]
        top_k: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let args = Args::parse_from(["product-similarity", "serve", "--port", "9000"]);

        match args.command {
            Command::Serve { host, port } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_search() {
        let args = Args::parse_from([
            "product-similarity",
            "search",
            "--text",
            "What can I use to cut wood?",
            "--product",
            "Circular saw",
            "--product",
            "Hammer",
            "--config",
            "settings.yaml",
        ]);

        assert_eq!(args.config, Some(PathBuf::from("settings.yaml")));
        match args.command {
            Command::Search {
                text,
                products,
                top_k,
            } => {
                assert_eq!(text, vec!["What can I use to cut wood?".to_string()]);
                assert_eq!(products, vec!["Circular saw".to_string(), "Hammer".to_string()]);
                assert_eq!(top_k, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
