use egui::{Color32, Pos2, Vec2};
use magic_message::geometry::{PathSegment, PathShape};
use magic_message::particle::{Particle, ParticleEmitter};

#[test]
fn test_two_point_path_keeps_endpoints() {
    let shape = PathShape::build([Pos2::new(0.0, 0.0), Pos2::new(10.0, 0.0)]);
    let path = shape.curve().unwrap();
    assert_eq!(path.start(), Some(Pos2::new(0.0, 0.0)));
    assert_eq!(path.end(), Some(Pos2::new(10.0, 0.0)));
    assert_eq!(
        path.segments(),
        &[
            PathSegment::MoveTo(Pos2::new(0.0, 0.0)),
            PathSegment::QuadTo {
                ctrl: Pos2::new(0.0, 0.0),
                to: Pos2::new(5.0, 0.0),
            },
            PathSegment::LineTo(Pos2::new(10.0, 0.0)),
        ]
    );

    let flat = path.flatten();
    assert_eq!(flat.first(), Some(&Pos2::new(0.0, 0.0)));
    assert_eq!(flat.last(), Some(&Pos2::new(10.0, 0.0)));
}

#[test]
fn test_single_point_is_not_a_curve() {
    let shape = PathShape::build([Pos2::new(3.0, 4.0)]);
    assert_eq!(shape, PathShape::Dot(Pos2::new(3.0, 4.0)));
    assert!(shape.curve().is_none());
    assert_eq!(PathShape::build(Vec::<Pos2>::new()), PathShape::Empty);
}

#[test]
fn test_particle_expires_after_lifetime() {
    let emitter = ParticleEmitter::default();
    let mut particles = vec![Particle {
        position: Pos2::ZERO,
        velocity: Vec2::new(1.0, 1.0),
        color: Color32::WHITE,
        size: 2.0,
        lifetime_ms: 300,
        age_ms: 0,
    }];

    for _ in 0..9 {
        emitter.advance(&mut particles, 33);
    }
    assert_eq!(particles.len(), 1);
    assert_eq!(particles[0].age_ms, 297);

    emitter.advance(&mut particles, 33);
    assert!(particles.is_empty());
}
