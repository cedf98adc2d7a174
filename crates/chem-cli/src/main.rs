use std::fs;
use std::process;

use chem_adapters::{EnumerationMode, EnumerationSettings, FilterSettings, FormulaFilter, QueryRow, ReactionEnumerator,
                    TargetRow};
use chem_core::Session;
use chem_domain::FormulaMap;
use chem_policies::{MatchParams, Quantifier, RelationMode};
use chemengine::EngineConfig;
use serde::Serialize;

const USAGE: &str = "uso:
  chem-cli formula parse <fórmula>
  chem-cli formula compare <objetivo> <consulta>
  chem-cli filter --targets <archivo> --queries <archivo> [--mode eq|le|ge] [--any N | --all]
                  [--append-keys] [--append-count] [--json]
  chem-cli enumerate --reaction <texto> --monomers a,b [--monomers c,d ...] [--max-products N]
                     [--max-depth N] [--multistep] [--self-reaction] [--grid] [--json]";

/// Fallo de la CLI con su código de salida.
#[derive(Debug, PartialEq)]
enum CliFailure {
    /// 2
    Usage(String),
    /// 4
    Unsupported(String),
    /// 5
    Runtime(String),
}

impl CliFailure {
    fn exit_code(&self) -> i32 {
        match self {
            CliFailure::Usage(_) => 2,
            CliFailure::Unsupported(_) => 4,
            CliFailure::Runtime(_) => 5,
        }
    }
}

fn usage(msg: impl Into<String>) -> CliFailure { CliFailure::Usage(msg.into()) }

fn runtime(e: impl std::fmt::Display) -> CliFailure { CliFailure::Runtime(e.to_string()) }

#[cfg(feature = "rdkit")]
type Engine = chemengine::RdkitEngine;
#[cfg(not(feature = "rdkit"))]
type Engine = chemengine::MockEngine;

#[cfg(feature = "rdkit")]
fn open_session(config: &EngineConfig) -> Result<Session<Engine>, CliFailure> {
    let engine = chemengine::RdkitEngine::init(config).map_err(runtime)?;
    Session::open(std::sync::Arc::new(engine)).map_err(runtime)
}

#[cfg(not(feature = "rdkit"))]
fn open_session(_config: &EngineConfig) -> Result<Session<Engine>, CliFailure> {
    Err(CliFailure::Unsupported("este binario se compiló sin motor químico; recompilar con --features rdkit".into()))
}

fn main() {
    // Cargar .env si existe (variables CHEM_*)
    let _ = dotenvy::dotenv();
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => process::exit(0),
        Err(failure) => {
            match &failure {
                CliFailure::Usage(msg) => eprintln!("[chem-cli] {msg}\n{USAGE}"),
                CliFailure::Unsupported(msg) => eprintln!("[chem-cli] no soportado: {msg}"),
                CliFailure::Runtime(msg) => eprintln!("[chem-cli] error: {msg}"),
            }
            process::exit(failure.exit_code());
        }
    }
}

fn run(args: &[String]) -> Result<(), CliFailure> {
    match args.first().map(String::as_str) {
        Some("formula") => run_formula(&args[1..]),
        Some("filter") => {
            let parsed = parse_filter_args(&args[1..])?;
            run_filter(parsed)
        }
        Some("enumerate") => {
            let parsed = parse_enumerate_args(&args[1..], &EngineConfig::from_env())?;
            run_enumerate(parsed)
        }
        Some(other) => Err(usage(format!("comando desconocido: {other}"))),
        None => Err(usage("falta el comando")),
    }
}

#[derive(Serialize)]
struct ParsedFormula<'a> {
    input: &'a str,
    hill: String,
    elements: &'a FormulaMap,
}

fn run_formula(args: &[String]) -> Result<(), CliFailure> {
    match args {
        [cmd, formula] if cmd == "parse" => {
            let map = FormulaMap::parse(formula).map_err(runtime)?;
            let out = ParsedFormula { input: formula,
                                      hill: map.to_string(),
                                      elements: &map };
            println!("{}", serde_json::to_string_pretty(&out).map_err(runtime)?);
            Ok(())
        }
        [cmd, target, query] if cmd == "compare" => {
            let target: FormulaMap = target.parse().map_err(runtime)?;
            let query: FormulaMap = query.parse().map_err(runtime)?;
            println!("{}", target.compare(&query));
            Ok(())
        }
        _ => Err(usage("formula parse <fórmula> | formula compare <objetivo> <consulta>")),
    }
}

#[derive(Debug, PartialEq)]
struct FilterArgs {
    targets: String,
    queries: String,
    settings: FilterSettings,
    json: bool,
}

/// Valor del flag en la posición `i + 1`.
fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, CliFailure> {
    args.get(i + 1).map(String::as_str).ok_or_else(|| usage(format!("{flag} requiere un valor")))
}

fn parse_filter_args(args: &[String]) -> Result<FilterArgs, CliFailure> {
    let config = EngineConfig::from_env();
    let mut targets = None;
    let mut queries = None;
    let mut relation = RelationMode::Equal;
    let mut quantifier = None;
    let mut append_query_keys = false;
    let mut append_match_count = false;
    let mut json = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--targets" => {
                targets = Some(flag_value(args, i, "--targets")?.to_string());
                i += 1;
            }
            "--queries" => {
                queries = Some(flag_value(args, i, "--queries")?.to_string());
                i += 1;
            }
            "--mode" => {
                relation = flag_value(args, i, "--mode")?.parse::<RelationMode>()
                                                       .map_err(|e| usage(e.to_string()))?;
                i += 1;
            }
            "--any" => {
                let raw = flag_value(args, i, "--any")?;
                let n = raw.parse::<usize>().map_err(|_| usage(format!("--any espera un entero, hay '{raw}'")))?;
                if quantifier.replace(Quantifier::MatchAnyAtLeast(n)).is_some() {
                    return Err(usage("--any y --all son excluyentes"));
                }
                i += 1;
            }
            "--all" => {
                if quantifier.replace(Quantifier::MatchAll).is_some() {
                    return Err(usage("--any y --all son excluyentes"));
                }
            }
            "--append-keys" => append_query_keys = true,
            "--append-count" => append_match_count = true,
            "--json" => json = true,
            other => return Err(usage(format!("argumento desconocido: {other}"))),
        }
        i += 1;
    }
    let targets = targets.ok_or_else(|| usage("falta --targets"))?;
    let queries = queries.ok_or_else(|| usage("falta --queries"))?;
    let params = MatchParams::new(relation, quantifier.unwrap_or_default());
    let settings = FilterSettings { append_query_keys,
                                    append_match_count,
                                    ..FilterSettings::from_config(&config, params) };
    Ok(FilterArgs { targets,
                    queries,
                    settings,
                    json })
}

/// `clave<TAB>valor` por línea. Se saltan líneas vacías y las que empiezan
/// con `#`. Un valor vacío o ausente es una celda ausente.
fn parse_tsv(text: &str) -> Vec<(String, Option<String>)> {
    text.lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .map(|line| {
            let (key, value) = match line.split_once('\t') {
                Some((k, v)) => (k, Some(v.trim())),
                None => (line, None),
            };
            (key.trim().to_string(), value.filter(|v| !v.is_empty()).map(str::to_string))
        })
        .collect()
}

fn read_tsv(path: &str) -> Result<Vec<(String, Option<String>)>, CliFailure> {
    let text = fs::read_to_string(path).map_err(|e| runtime(format!("no se pudo leer {path}: {e}")))?;
    Ok(parse_tsv(&text))
}

fn run_filter(args: FilterArgs) -> Result<(), CliFailure> {
    let targets: Vec<TargetRow> = read_tsv(&args.targets)?.into_iter()
                                                          .map(|(key, structure)| TargetRow { key, structure })
                                                          .collect();
    let queries: Vec<QueryRow> = read_tsv(&args.queries)?.into_iter()
                                                         .map(|(key, formula)| QueryRow { key, formula })
                                                         .collect();
    let session = open_session(&EngineConfig::from_env())?;
    let outcome = FormulaFilter::new(session, args.settings).run(&targets, &queries);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome).map_err(runtime)?);
        return Ok(());
    }
    for (channel, rows) in [("matched", &outcome.matched), ("unmatched", &outcome.unmatched)] {
        for row in rows {
            let mut line = format!("{channel}\t{}\t{}\t{}", row.key, row.structure, row.gross_formula);
            if let Some(keys) = &row.matched_query_keys {
                line.push('\t');
                line.push_str(keys);
            }
            if let Some(count) = row.match_count {
                line.push_str(&format!("\t{count}"));
            }
            println!("{line}");
        }
    }
    for row in &outcome.invalid {
        println!("invalid\t{}\t{}\t{}", row.key, row.structure.as_deref().unwrap_or(""), row.reason);
    }
    eprintln!("[chem-cli] run {}: {} matched, {} unmatched, {} invalid",
              outcome.report.run_id,
              outcome.report.succeeded,
              outcome.report.rejected,
              outcome.report.invalid);
    Ok(())
}

#[derive(Debug, PartialEq)]
struct EnumerateArgs {
    reaction: String,
    monomers: Vec<Vec<String>>,
    settings: EnumerationSettings,
    json: bool,
}

fn parse_enumerate_args(args: &[String], config: &EngineConfig) -> Result<EnumerateArgs, CliFailure> {
    let mut reaction = None;
    let mut monomers = Vec::new();
    let mut settings = EnumerationSettings::from_config(config);
    let mut json = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--reaction" => {
                reaction = Some(flag_value(args, i, "--reaction")?.to_string());
                i += 1;
            }
            "--monomers" => {
                let list = flag_value(args, i, "--monomers")?;
                monomers.push(list.split(',').map(str::trim).filter(|m| !m.is_empty()).map(str::to_string).collect());
                i += 1;
            }
            "--max-products" => {
                let raw = flag_value(args, i, "--max-products")?;
                settings.max_products = raw.parse().map_err(|_| usage(format!("--max-products espera un entero, hay '{raw}'")))?;
                i += 1;
            }
            "--max-depth" => {
                let raw = flag_value(args, i, "--max-depth")?;
                settings.max_depth = raw.parse().map_err(|_| usage(format!("--max-depth espera un entero, hay '{raw}'")))?;
                i += 1;
            }
            "--multistep" => settings.multistep = true,
            "--self-reaction" => settings.self_reaction = true,
            "--grid" => settings.mode = EnumerationMode::Grid,
            "--json" => json = true,
            other => return Err(usage(format!("argumento desconocido: {other}"))),
        }
        i += 1;
    }
    let reaction = reaction.ok_or_else(|| usage("falta --reaction"))?;
    if monomers.is_empty() {
        return Err(usage("se requiere al menos una lista --monomers"));
    }
    Ok(EnumerateArgs { reaction,
                       monomers,
                       settings,
                       json })
}

fn run_enumerate(args: EnumerateArgs) -> Result<(), CliFailure> {
    let session = open_session(&EngineConfig::from_env())?;
    let outcome = ReactionEnumerator::new(session, args.settings).run(&args.reaction, &args.monomers)
                                                                 .map_err(runtime)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome).map_err(runtime)?);
        return Ok(());
    }
    for p in &outcome.products {
        println!("{}\t{}", p.index, p.smiles);
    }
    for item in &outcome.invalid {
        eprintln!("[chem-cli] inválido {}: {}", item.location, item.reason);
    }
    Ok(())
}
