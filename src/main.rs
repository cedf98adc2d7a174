use std::sync::Arc;

use chembind_rust::prelude::*;
use serde_json::to_string_pretty;

/// Motor en memoria con las fórmulas que usa la demo.
fn demo_engine() -> MockEngine {
    MockEngine::new().with_formula("OCC(O)C(O)C(O)C(O)C=O", "C6 H12 O6")
                     .with_formula("C", "C H4")
                     .with_formula("CC", "C2 H6")
                     .with_formula("CCC", "C3 H8")
                     .with_formula("CCO", "C2 H6 O")
                     .with_formula("[Na+].[Cl-]", "Cl Na")
                     .with_formula("CC(=O)O", "C2 H4 O2")
                     .with_formula("NC", "C H5 N")
                     .with_formula("CCN", "C2 H7 N")
}

/// Ciclo de vida: carga, clon, iteración y liberación.
fn run_lifecycle_demo(session: &Session<MockEngine>) -> Result<(), AppError> {
    let ethanol = session.load_molecule("CCO")?;
    let copy = ethanol.try_clone()?;
    println!("[lifecycle] etanol {:?} / copia {:?} -> {}",
             ethanol.handle(),
             copy.handle(),
             copy.gross_formula()?);

    let array = session.create_array()?;
    for smiles in ["C", "CC", "CCC"] {
        let m = session.load_molecule(smiles)?;
        array.array_add(&m)?;
    }
    println!("[lifecycle] arreglo con {} elementos, handles vivos: {}",
             array.count()?,
             session.count_references()?);
    if let Some(mut cursor) = array.iter()? {
        while let Some(item) = cursor.next_object()? {
            println!("[lifecycle]   {} -> {}", item.smiles()?, item.gross_formula()?);
        }
        println!("[lifecycle] estado del cursor: {:?}", cursor.state());
    }
    Ok(())
}

/// Comparación directa de fórmulas brutas.
fn run_formula_demo() -> Result<(), AppError> {
    for (target, query) in [("C6H12O6", "C6H12O6"), ("CH4", "C2H6"), ("C3H8", "CH4"), ("NaCl", "C6H12O6")] {
        let t: FormulaMap = target.parse()?;
        let q: FormulaMap = query.parse()?;
        println!("[formula] {t} vs {q}: {}", t.compare(&q));
    }
    Ok(())
}

fn run_filter_demo(session: &Session<MockEngine>) -> Result<(), AppError> {
    let targets = vec![TargetRow::new("glucosa", Some("OCC(O)C(O)C(O)C(O)C=O")),
                       TargetRow::new("metano", Some("C")),
                       TargetRow::new("propano", Some("CCC")),
                       TargetRow::new("sal", Some("[Na+].[Cl-]")),
                       TargetRow::new("vacío", None)];
    let queries = vec![QueryRow::new("q1", Some("C2H6")),
                       QueryRow::new("q2", Some("NaCl")),
                       QueryRow::new("q3", Some("CH4"))];
    let settings = FilterSettings { params: MatchParams::new(RelationMode::LessOrEqual, Quantifier::MatchAnyAtLeast(2)),
                                    append_query_keys: true,
                                    append_match_count: true,
                                    ..FilterSettings::from_config(&EngineConfig::from_env(), MatchParams::default()) };
    let outcome = FormulaFilter::new(session.clone(), settings).run(&targets, &queries);
    println!("[filter] resultado:\n{}", to_string_pretty(&outcome)?);
    Ok(())
}

fn run_enumeration_demo(session: &Session<MockEngine>) -> Result<(), AppError> {
    let settings = EnumerationSettings::from_config(&EngineConfig::from_env());
    let monomers = vec![vec!["CC(=O)O".to_string()], vec!["NC".to_string(), "CCN".to_string()]];
    let outcome = ReactionEnumerator::new(session.clone(), settings).run("CC(=O)O.NC>>CC(=O)NC", &monomers)?;
    for p in &outcome.products {
        println!("[enumerate] producto {}: {}", p.index, p.smiles);
    }
    println!("[enumerate] run_id={} productos={} inválidos={}",
             outcome.report.run_id,
             outcome.report.succeeded,
             outcome.report.invalid);
    Ok(())
}

fn run_demo() -> Result<(), AppError> {
    let engine = Arc::new(demo_engine());
    let session = Session::open(Arc::clone(&engine))?;
    println!("Motor: {}", session.version());

    run_lifecycle_demo(&session)?;
    run_formula_demo()?;
    run_filter_demo(&session)?;
    run_enumeration_demo(&session)?;

    println!("Handles vivos al terminar: {}", session.count_references()?);
    drop(session);
    println!("Sesiones abiertas: {}", engine.open_sessions());
    Ok(())
}

fn main() {
    // Cargar variables de entorno desde .env si existe (CHEM_*)
    let _ = dotenvy::dotenv();
    if let Err(e) = run_demo() {
        eprintln!("[main-core] {e}");
        std::process::exit(5);
    }
}
