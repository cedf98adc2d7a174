use chem_domain::{DomainError, FormulaMap, FormulaRelation};

fn parse(s: &str) -> FormulaMap { s.parse().expect("fórmula válida") }

#[test]
fn test_parse_examples() {
    let glucose = parse("C6H12O6");
    assert_eq!(glucose.get("C"), Some(6));
    assert_eq!(glucose.get("H"), Some(12));
    assert_eq!(glucose.get("O"), Some(6));
    assert_eq!(glucose.len(), 3);

    let salt = parse("NaCl");
    assert_eq!(salt.elements().collect::<Vec<_>>(), vec![("Na", 1), ("Cl", 1)]);

    let water = parse("H2O");
    assert_eq!(water.elements().collect::<Vec<_>>(), vec![("H", 2), ("O", 1)]);
}

#[test]
fn test_compare_examples() {
    assert_eq!(parse("C6H12O6").compare(&parse("C6H12O6")), FormulaRelation::Equal);
    assert_eq!(parse("CH4").compare(&parse("C2H6")), FormulaRelation::TargetIsSubset);
    // Mismo conjunto de claves {C, H}: 3 >= 1 y 8 >= 4, el objetivo es superconjunto.
    assert_eq!(parse("C3H8").compare(&parse("CH4")), FormulaRelation::TargetIsSuperset);
    // La relación no es simétrica en la etiqueta, sí en la dirección.
    assert_eq!(parse("CH4").compare(&parse("C3H8")), FormulaRelation::TargetIsSubset);
    assert_eq!(parse("NaCl").compare(&parse("C6H12O6")), FormulaRelation::Incomparable);
}

#[test]
fn test_engine_style_formula_with_spaces() {
    // Los motores suelen devolver la fórmula separada por espacios.
    assert_eq!(parse("C2 H6 O").compare(&parse("C2H6O")), FormulaRelation::Equal);
}

#[test]
fn test_malformed_formula_error() {
    let err = FormulaMap::parse("2H2O").unwrap_err();
    match err {
        DomainError::MalformedFormula { input, .. } => assert_eq!(input, "2H2O"),
        other => panic!("error inesperado: {other:?}"),
    }
}
