//! Tests de integración del ciclo de vida de handles contra el motor en
//! memoria: liberación única, centinela, iteración y sesiones.

use std::sync::Arc;

use chem_core::{CoreError, CursorState, Handle, Session};
use chemengine::{options, MockEngine, NativeEngine};

fn engine() -> Arc<MockEngine> {
    Arc::new(MockEngine::new().with_formula("CCO", "C2 H6 O")
                              .with_formula("C", "C H4")
                              .with_formula("NC", "C H5 N"))
}

#[test]
fn dispose_twice_leaves_other_handles_alive() {
    let session = Session::open(engine()).unwrap();
    let mut a = session.load_molecule("CCO").unwrap();
    let b = session.load_molecule("C").unwrap();
    a.dispose();
    a.dispose();
    drop(a);
    assert_eq!(session.count_references().unwrap(), 1);
    assert_eq!(b.gross_formula().unwrap(), "C H4");
}

#[test]
fn sentinel_results_are_none() {
    let session = Session::open(engine()).unwrap();
    assert!(session.wrap(Handle::SENTINEL).is_none());

    // Enumeración sin productos: el motor devuelve el centinela.
    let rxn = session.load_reaction("A.B>>AB").unwrap();
    let table = session.create_array().unwrap();
    let first = session.create_array().unwrap();
    first.array_add(&session.load_molecule("C").unwrap()).unwrap();
    let empty = session.create_array().unwrap();
    table.array_add(&first).unwrap();
    table.array_add(&empty).unwrap();
    assert!(session.reaction_product_enumerate(&rxn, &table).unwrap().is_none());
}

#[test]
fn exhausted_iterator_stays_exhausted() {
    let session = Session::open(engine()).unwrap();
    let array = session.create_array().unwrap();
    array.array_add(&session.load_molecule("NC").unwrap()).unwrap();
    let mut it = array.iter().unwrap().unwrap();
    assert_eq!(it.next_object().unwrap().unwrap().gross_formula().unwrap(), "C H5 N");
    for _ in 0..5 {
        assert!(it.next_object().unwrap().is_none());
        assert_eq!(it.state(), CursorState::Exhausted);
        assert!(!it.has_next().unwrap());
    }
}

#[test]
fn products_are_iterated_and_released() {
    let session = Session::open(engine()).unwrap();
    {
        session.set_option(options::RPE_MAX_PRODUCTS_COUNT, 10i64).unwrap();
        let rxn = session.load_reaction("A.B>>AB").unwrap();
        assert_eq!(rxn.count().unwrap(), 2);
        let table = session.create_array().unwrap();
        for list in [vec!["CCO", "C"], vec!["NC"]] {
            let reactant = session.create_array().unwrap();
            for s in list {
                reactant.array_add(&session.load_molecule(s).unwrap()).unwrap();
            }
            table.array_add(&reactant).unwrap();
        }
        let products = session.reaction_product_enumerate(&rxn, &table).unwrap().unwrap();
        assert_eq!(products.count().unwrap(), 2);
        let smiles: Vec<String> = products.iter()
                                          .unwrap()
                                          .unwrap()
                                          .map(|p| p.and_then(|p| p.smiles()))
                                          .collect::<Result<_, _>>()
                                          .unwrap();
        assert_eq!(smiles, vec!["CCO.NC", "C.NC"]);
        session.reset_options().unwrap();
    }
    assert_eq!(session.count_references().unwrap(), 0);
}

#[test]
fn use_after_external_release_is_invalid_handle() {
    let session = Session::open(engine()).unwrap();
    let m = session.load_molecule("CCO").unwrap();
    let raw = m.handle().unwrap();
    session.with_engine(|e, sid| e.free(sid, raw)).unwrap();
    assert_eq!(m.smiles(), Err(CoreError::InvalidHandle(raw)));
}

#[test]
fn release_session_after_objects_outlive_it() {
    let engine = engine();
    let session = Session::open(Arc::clone(&engine)).unwrap();
    let m = session.load_molecule("CCO").unwrap();
    let other = Session::open(Arc::clone(&engine)).unwrap();
    assert!(!session.same_as(&other));
    drop(session);
    assert_eq!(m.gross_formula().unwrap(), "C2 H6 O");
    assert_eq!(engine.open_sessions(), 2);
    drop(m);
    drop(other);
    assert_eq!(engine.open_sessions(), 0);
}
