use splice::units::{CombineOp, SiRegistry, UnitError, UnitSystem};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

#[test]
fn resolves_prefixed_and_compound_units() {
    let units = SiRegistry::new();

    let cm = units.resolve("cm").expect("cm");
    assert_eq!(cm.to_latex(), "\\mathrm{cm}");
    assert!(close(cm.scale(), 0.01));

    let speed = units.resolve("km/h").expect("km/h");
    assert_eq!(speed.to_string(), "km*h^-1");
    assert_eq!(speed.to_latex(), "\\mathrm{km}\\,\\mathrm{h}^{-1}");

    let accel = units.resolve("m s^-2").expect("m s^-2");
    assert_eq!(accel.to_string(), "m*s^-2");

    let hertz = units.resolve("1/s").expect("1/s");
    assert_eq!(hertz.to_string(), "s^-1");

    let micro = units.resolve("um").expect("um");
    assert_eq!(micro.to_latex(), "\\mu \\mathrm{m}");
}

#[test]
fn rejects_bad_descriptors() {
    let units = SiRegistry::new();
    assert!(matches!(units.resolve("furlong"), Err(UnitError::Unknown(_))));
    assert!(matches!(
        units.resolve("m/"),
        Err(UnitError::Malformed { .. })
    ));
    assert!(matches!(
        units.resolve("m^x"),
        Err(UnitError::Malformed { .. })
    ));
}

#[test]
fn converts_between_compatible_units() {
    let units = SiRegistry::new();
    let inch = units.resolve("inch").expect("inch");
    let cm = units.resolve("cm").expect("cm");
    assert!(close(units.convert(1.0, &inch, &cm).expect("convert"), 2.54));

    let kmh = units.resolve("km/h").expect("km/h");
    let ms = units.resolve("m/s").expect("m/s");
    assert!(close(units.convert(36.0, &kmh, &ms).expect("convert"), 10.0));

    let joule = units.resolve("J").expect("J");
    let newton_metre = units.resolve("N*m").expect("N*m");
    assert!(joule.is_compatible(&newton_metre));

    let second = units.resolve("s").expect("s");
    assert!(matches!(
        units.convert(1.0, &cm, &second),
        Err(UnitError::Incompatible { .. })
    ));
}

#[test]
fn combining_units() {
    let units = SiRegistry::new();
    let m = units.resolve("m").expect("m");
    let s = units.resolve("s").expect("s");

    let area = units.combine(CombineOp::Product, &m, &m).expect("product");
    assert_eq!(area.to_string(), "m^2");

    let speed = units.combine(CombineOp::Quotient, &m, &s).expect("quotient");
    assert_eq!(speed.to_string(), "m*s^-1");

    let cancelled = units.combine(CombineOp::Quotient, &m, &m).expect("quotient");
    assert!(cancelled.is_empty());

    assert!(units.combine(CombineOp::Sum, &m, &s).is_err());
    let root = units.power(&area, 0.5).expect("power");
    assert_eq!(root.to_string(), "m");
}
