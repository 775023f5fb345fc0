//! End-to-end scenario: the OSLO Cooke triplet demo prescription, from YAML
//! text through first-order analysis to aimed geometric bundles.
use approx::assert_abs_diff_eq;
use lenstrace::formats::{system_from_yaml, system_to_yaml};
use lenstrace::{Distribution, Element, GeometricTrace, OpticalSystem, ParaxialTrace};

const COOKE_YAML: &str = "
description: 'oslo cooke triplet example 50mm f/4 20deg'
object: {angle: .364}
stop: 5
elements:
- {material: air}
- {roc: 21.25, distance: 5.0, material: SK16, radius: 6.5}
- {roc: -158.65, distance: 2.0, material: air, radius: 6.5}
- {roc: -20.25, distance: 6.0, material: F4, radius: 5.0}
- {roc: 19.3, distance: 1.0, material: air, radius: 5.0}
- {material: basic/air, radius: 4.75}
- {roc: 141.25, distance: 6.0, material: SK16, radius: 6.5}
- {roc: -17.285, distance: 2.0, material: air, radius: 6.5}
- {distance: 42.95, radius: 0.364}
";

fn system() -> OpticalSystem {
    system_from_yaml(COOKE_YAML).unwrap()
}

fn traces(s: &OpticalSystem) -> ParaxialTrace {
    ParaxialTrace::new(s, s.wavelengths()[0]).unwrap()
}

#[test]
fn from_text() {
    let s = system();
    assert!(matches!(s[0], Element::Object { finite: false, .. }));
    for (i, el) in s.iter().enumerate() {
        if i != 0 {
            assert!(el.radius() > 0.0, "element {i} has no aperture");
        }
        if i != 0 && Some(i) != s.stop() {
            assert!(el.distance() > 0.0, "element {i} has no gap");
        }
        if i != 0 && Some(i) != s.stop() && i != s.len() - 1 {
            assert!(el.curvature().abs() > 0.0, "element {i} is flat");
        }
        if i != s.len() - 1 {
            assert!(el.material().is_some(), "element {i} has no material");
        }
    }
}

#[test]
fn system_prints_and_designates_the_stop() {
    let s = system();
    assert!(format!("{s}").lines().count() > 10);
    let stop = s.stop().unwrap();
    assert!(std::ptr::eq(s.aperture().unwrap(), &s[stop]));
}

#[test]
fn yaml_round_trip() {
    let s = system();
    let reparsed = system_from_yaml(&system_to_yaml(&s).unwrap()).unwrap();
    assert_eq!(reparsed, s);
}

#[test]
fn reverse_is_an_involution() {
    let mut s = system();
    let original = s.clone();
    s.reverse();
    assert!(s.validate().is_ok());
    s.reverse();
    for (a, b) in s.iter().zip(original.iter()) {
        assert_abs_diff_eq!(a.distance(), b.distance(), epsilon = 1e-12);
        assert_abs_diff_eq!(a.curvature(), b.curvature(), epsilon = 1e-12);
        assert_abs_diff_eq!(a.radius(), b.radius(), epsilon = 1e-12);
    }
}

#[test]
fn rescale_round_trip() {
    let mut s = system();
    let distances: Vec<f64> = s.iter().map(Element::distance).collect();
    s.rescale(Some(lenstrace::micrometer!(123.0))).unwrap();
    for (el, d) in s.iter().zip(&distances) {
        assert_abs_diff_eq!(el.distance() * 0.123, *d, epsilon = 1e-9);
    }
    s.rescale(None).unwrap();
    for (el, d) in s.iter().zip(&distances) {
        assert_abs_diff_eq!(el.distance(), *d, epsilon = 1e-12);
    }
}

#[test]
fn clipping_rays() {
    let s = system();
    let p = traces(&s);
    let g = GeometricTrace::rays_paraxial_clipping(&s, &p).unwrap();
    // infinite conjugate: one shared direction for the whole bundle
    let u0 = g.u()[0][0];
    for u in &g.u()[0][1..] {
        assert_abs_diff_eq!((u - u0).norm(), 0.0, epsilon = 1e-14);
    }
    // chief crosses the stop axis
    let stop = s.stop().unwrap();
    assert_abs_diff_eq!(g.y()[stop][0].y, 0.0, epsilon = 1e-7);
    // marginal rays graze their limiting apertures
    let margins = g.clipping_margins(&s);
    assert_abs_diff_eq!(margins[0], 0.0, epsilon = 1e-7);
    assert_abs_diff_eq!(margins[1], 0.0, epsilon = 1e-7);
}

#[test]
fn cross_bundle_at_the_stop() {
    let s = system();
    let p = traces(&s);
    let g = GeometricTrace::rays_paraxial_point(&s, &p, 1.0, Distribution::Cross, 5).unwrap();
    let u0 = g.u()[0][0];
    for u in &g.u()[0][1..] {
        assert_abs_diff_eq!((u - u0).norm(), 0.0, epsilon = 1e-14);
    }
    let stop = s.stop().unwrap();
    let r = s[stop].radius();
    for (i, want) in [-1.0, 0.0, 1.0].iter().enumerate() {
        assert_abs_diff_eq!(g.y()[stop][i].y / r, *want, epsilon = 1e-2);
    }
    for (i, want) in [0.0, 0.0, 0.0, -1.0, 0.0, 1.0].iter().enumerate() {
        assert_abs_diff_eq!(g.y()[stop][i].x / r, *want, epsilon = 1e-3);
    }
    let _ = GeometricTrace::rays_paraxial_line(&s, &p).unwrap();
}
