use clap::{Arg, ArgAction, ArgMatches, Command};
use lineardoc::{Document, MwContextualizer, Parser, Segmenter};
use lineardoc_mt::{LinearDocConfig, MachineTranslator, MockMode, MockTranslator, Wrapper};
use std::collections::HashMap;
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn file_arg() -> Arg {
    Arg::new("file")
        .help("XHTML fragment to read")
        .required(true)
        .index(1)
}

fn cli() -> Command {
    Command::new("lineardoc-mt")
        .version("0.1.0")
        .about("Parse, segment and translate XHTML fragments while keeping their inline markup")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML configuration file")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log every unit and anomaly")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("normalize")
                .about("Parse and serialise the fragment again")
                .arg(file_arg()),
        )
        .subcommand(
            Command::new("dump")
                .about("Print the canonical dump of the linear document")
                .arg(file_arg()),
        )
        .subcommand(
            Command::new("segment")
                .about("Print the fragment with its sentences wrapped in segment spans")
                .arg(file_arg())
                .arg(
                    Arg::new("lang")
                        .long("lang")
                        .short('l')
                        .help("Language of the fragment (e.g., en, ja, hi)")
                        .default_value("en"),
                ),
        )
        .subcommand(
            Command::new("translate")
                .about("Translate the fragment with a mock engine and rebuild its markup")
                .arg(file_arg())
                .arg(
                    Arg::new("from")
                        .long("from")
                        .short('s')
                        .help("Source language code")
                        .default_value("en"),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .short('t')
                        .help("Target language code")
                        .required(true),
                )
                .arg(
                    Arg::new("mappings")
                        .long("mappings")
                        .short('m')
                        .help("JSON object of source text to translation")
                        .conflicts_with("mode"),
                )
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .help("Mock engine behaviour")
                        .value_parser(["suffix", "reorder", "noop"])
                        .default_value("suffix"),
                ),
        )
}

fn read_document(matches: &ArgMatches, config: &LinearDocConfig) -> Result<Document, Box<dyn std::error::Error>> {
    let path = matches
        .get_one::<String>("file")
        .ok_or("missing input file")?;
    let source = fs::read_to_string(path)?;
    let doc = Parser::new(&source, &MwContextualizer)
        .with_options(config.parser)
        .parse()?;
    info!(path = %path, items = doc.len(), "parsed fragment");
    Ok(doc)
}

fn build_translator(matches: &ArgMatches) -> Result<MockTranslator, Box<dyn std::error::Error>> {
    let target = matches.get_one::<String>("to").ok_or("missing target language")?;
    if let Some(path) = matches.get_one::<String>("mappings") {
        let pairs: HashMap<String, String> = serde_json::from_str(&fs::read_to_string(path)?)?;
        info!(path = %path, pairs = pairs.len(), "loaded mappings");
        return Ok(MockTranslator::from_pairs(target, pairs));
    }
    let mode = match matches.get_one::<String>("mode").map(String::as_str) {
        Some("reorder") => MockMode::Reorder,
        Some("noop") => MockMode::NoOp,
        _ => MockMode::Suffix,
    };
    Ok(MockTranslator::new(mode))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();
    let verbose = matches.get_flag("verbose");

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match matches.get_one::<String>("config") {
        Some(path) => LinearDocConfig::load(path)?,
        None => LinearDocConfig::default(),
    };

    match matches.subcommand() {
        Some(("normalize", sub)) => {
            let doc = read_document(sub, &config)?;
            println!("{}", doc.to_markup()?);
        }
        Some(("dump", sub)) => {
            let doc = read_document(sub, &config)?;
            println!("{}", doc.dump_canonical());
        }
        Some(("segment", sub)) => {
            let doc = read_document(sub, &config)?;
            let lang = sub.get_one::<String>("lang").ok_or("missing language")?;
            let segmented = Segmenter::for_language(lang).segment(&doc)?;
            info!(segments = segmented.segments().len(), "segmented fragment");
            println!("{}", segmented.render()?);
        }
        Some(("translate", sub)) => {
            let doc = read_document(sub, &config)?;
            let from = sub.get_one::<String>("from").ok_or("missing source language")?;
            let to = sub.get_one::<String>("to").ok_or("missing target language")?;
            let translator = build_translator(sub)?;
            info!(provider = translator.provider_name(), "{} → {}", from, to);

            let segmented = Segmenter::for_language(from).segment(&doc)?;
            let result = Wrapper::new(&translator, from, to)
                .with_options(config.translation)
                .translate_segmented(&segmented)
                .await?;

            println!("{}", result.to_markup()?);
            eprintln!("{} anomalies", result.anomalies.len());
        }
        _ => return Err("a subcommand is required".into()),
    }

    Ok(())
}
