//! mcx CLI: Markup Compatibility preprocessing of XML documents.
//!
//! Exit status: 0 on success, 1 on fatal errors (I/O, malformed XML, bad
//! options), 2 if MC violations were recorded (unless `--lenient`). The
//! processed output is written in every non-fatal case.

use clap::Parser;
use mcx::filter::CompatibilityFilter;
use mcx::options::FilterOptions;
use mcx::xml::XmlTokenizer;
use mcx::xml_writer::XmlWriter;
use std::io::{BufRead, BufReader, IsTerminal, Write};
use std::process;

#[derive(Parser)]
#[command(name = "mcx", version, about = "Markup Compatibility (ECMA-376 Part 3) preprocessor")]
struct Cli {
    /// Input file (- for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Output file (- for stdout)
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Understood namespace URI, taken verbatim (repeatable)
    #[arg(short, long = "supported", value_name = "URI")]
    supported: Vec<String>,

    /// Prefix of an understood namespace: PREFIX=URI (repeatable, implies --supported URI)
    #[arg(short, long = "prefix", value_name = "PREFIX=URI", value_parser = parse_prefix_binding)]
    prefix: Vec<(String, String)>,

    /// Element passed through verbatim: prefix:local or {uri}local (repeatable)
    #[arg(short, long = "extension", value_name = "QNAME")]
    extension: Vec<String>,

    /// Drop comments
    #[arg(long)]
    no_comments: bool,

    /// Drop processing instructions
    #[arg(long)]
    no_pis: bool,

    /// Start the output with an XML declaration
    #[arg(long)]
    xml_declaration: bool,

    /// Exit with status 0 even if MC violations were recorded
    #[arg(long)]
    lenient: bool,

    /// Do not print MC violations to stderr
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn to_options(&self) -> FilterOptions {
        let mut opts = FilterOptions::new()
            .with_comments(!self.no_comments)
            .with_processing_instructions(!self.no_pis);
        for uri in &self.supported {
            opts.add_supported_namespace(uri, Vec::<String>::new());
        }
        for (prefix, uri) in &self.prefix {
            opts.add_supported_namespace(uri, [prefix.as_str()]);
        }
        for name in &self.extension {
            opts.add_extension_element(name.as_str());
        }
        opts
    }
}

/// `PREFIX=URI`. Getrennt wird am ersten `=`, die URI darf selbst `=` enthalten.
fn parse_prefix_binding(value: &str) -> Result<(String, String), String> {
    let Some((prefix, uri)) = value.split_once('=') else {
        return Err(format!("expected PREFIX=URI, got '{value}'"));
    };
    if prefix.is_empty() || prefix.contains(':') || prefix.chars().any(char::is_whitespace) {
        return Err(format!("invalid prefix '{prefix}'"));
    }
    if uri.is_empty() {
        return Err(format!("empty namespace URI for prefix '{prefix}'"));
    }
    Ok((prefix.to_string(), uri.to_string()))
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(0) => {}
        Ok(_) if cli.lenient => {}
        Ok(_) => process::exit(2),
        Err(e) => {
            eprintln!("Fehler: {e}");
            process::exit(1);
        }
    }
}

/// Returns the number of recorded MC violations.
fn run(cli: &Cli) -> Result<usize, String> {
    let opts = cli.to_options();
    let input = open_input(&cli.input)?;
    let mut violations = 0usize;

    write_to_output(&cli.output, |writer| {
        let xml_writer = if cli.xml_declaration {
            XmlWriter::with_declaration(writer)
        } else {
            XmlWriter::new(writer)
        };
        let mut filter = CompatibilityFilter::with_options(xml_writer, &opts)
            .map_err(|e| format!("Ungueltige Optionen: {e}"))?;
        let mut tokenizer = XmlTokenizer::new(input);

        while tokenizer.step(&mut filter).map_err(|e| format!("Parse-Fehler: {e}"))? {
            if filter.error_reported() {
                for err in filter.drain_errors() {
                    violations += 1;
                    if !cli.quiet {
                        eprintln!("{err}");
                    }
                }
            }
        }

        filter
            .into_handler()
            .finish()
            .map_err(|e| format!("Schreibfehler: {e}"))?;
        Ok(())
    })?;

    Ok(violations)
}

/// Oeffnet die Eingabe als gepufferten Reader (Datei oder stdin).
fn open_input(path: &str) -> Result<Box<dyn BufRead>, String> {
    if path == "-" {
        if std::io::stdin().is_terminal() {
            eprintln!("Lese von stdin (Ctrl+D zum Beenden)...");
        }
        return Ok(Box::new(std::io::stdin().lock()));
    }
    let file = std::fs::File::open(path).map_err(|e| format!("Lesefehler ({path}): {e}"))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Erstellt einen BufWriter fuer stdout oder eine Datei.
fn create_buf_writer(path: &str) -> Result<std::io::BufWriter<Box<dyn Write>>, String> {
    if path == "-" {
        Ok(std::io::BufWriter::new(Box::new(std::io::stdout())))
    } else {
        let file = std::fs::File::create(path).map_err(|e| format!("Schreibfehler: {e}"))?;
        Ok(std::io::BufWriter::new(Box::new(file)))
    }
}

/// Schreibt Output entweder nach stdout ("-") oder atomar in eine Datei (tmp+rename).
fn write_to_output(
    output_path: &str,
    write_fn: impl FnOnce(std::io::BufWriter<Box<dyn Write>>) -> Result<(), String>,
) -> Result<(), String> {
    if output_path == "-" {
        return write_fn(create_buf_writer("-")?);
    }

    let tmp_path = format!("{output_path}.tmp");
    let writer = create_buf_writer(&tmp_path)?;
    if let Err(e) = write_fn(writer) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    std::fs::rename(&tmp_path, output_path).map_err(|e| format!("Rename-Fehler: {e}"))
}
