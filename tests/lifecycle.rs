//! Instance lifecycle, activation and rendering consistency.

use nodal::activation::SectionExtent;
use nodal::prelude::*;
use nodal::render::RenderSurface;

const DT: f32 = 1.0 / 60.0;

fn sim(particles: usize) -> SimulationInstance {
    Simulation::new()
        .with_particle_count(particles)
        .with_seed(11)
        .with_backend(BackendPreference::Cpu)
        .with_surface_size(80.0, 60.0)
        .build()
}

#[test]
fn scatter_zeroes_velocity_and_stays_in_bounds() {
    let mut sim = sim(1_000);
    for _ in 0..30 {
        sim.frame(DT);
    }
    sim.scatter();
    // dt = 0 applies the scatter without integrating afterwards.
    sim.frame(0.0);
    for p in sim.particles().particles() {
        assert_eq!(p.velocity, Vec2::ZERO);
        assert!(p.in_bounds());
    }
}

#[test]
fn two_scatters_give_different_layouts() {
    let mut sim = sim(1_000);
    sim.scatter();
    sim.frame(0.0);
    let first: Vec<Vec2> = sim.particles().positions().collect();
    sim.scatter();
    sim.frame(0.0);
    let second: Vec<Vec2> = sim.particles().positions().collect();
    assert_ne!(first, second);
}

#[test]
fn resize_round_trip_keeps_screen_positions() {
    let mut surface = RenderSurface::new(800, 600, 1.0);
    let points = [Vec2::new(0.9, -0.9), Vec2::new(-0.25, 0.5), Vec2::ZERO];
    let before: Vec<Vec2> = points.iter().map(|&p| surface.to_screen(p)).collect();

    surface.resize(1600, 900);
    for &p in &points {
        // Still inside the centred square, still aspect-correct.
        let s = surface.to_screen(p);
        let back = surface.to_normalized(s);
        assert!((back - p).length() < 1e-5);
    }

    surface.resize(800, 600);
    let after: Vec<Vec2> = points.iter().map(|&p| surface.to_screen(p)).collect();
    assert_eq!(before, after);
}

#[test]
fn resize_signals_reach_the_canvas() {
    let mut sim = Simulation::new()
        .with_particle_count(100)
        .with_backend(BackendPreference::Cpu)
        .with_surface_size(800.0, 600.0)
        .build();
    sim.frame(DT);
    sim.schedule(Signal::Resize { width: 1600, height: 900 });
    sim.frame(DT);
    assert_eq!(sim.snapshot().unwrap().dimensions(), (1600, 900));
    sim.schedule(Signal::Resize { width: 800, height: 600 });
    sim.frame(DT);
    assert_eq!(sim.snapshot().unwrap().dimensions(), (800, 600));
}

#[test]
fn discrete_activation_retargets_and_retains() {
    let source = IntersectionSource::new(vec![
        SectionExtent::new("hero", 0.0, 60.0),
        SectionExtent::new("performance", 60.0, 60.0),
    ]);
    let mut sim = Simulation::new()
        .with_particle_count(200)
        .with_surface_size(80.0, 60.0)
        .with_source(source)
        .build();

    sim.schedule(Signal::ScrollTo(60.0));
    sim.frame(DT);
    assert_eq!(sim.transition().target_id(), "performance");

    // Past the last section: nothing visible, last pattern retained.
    sim.schedule(Signal::ScrollTo(10_000.0));
    sim.frame(DT);
    assert_eq!(sim.transition().target_id(), "performance");
}

#[test]
fn scroll_linked_story_scrubs_modes() {
    let registry = PatternRegistry::new()
        .with("a", PatternConfig::chladni(2.0, 3.0))
        .with("b", PatternConfig::chladni(4.0, 7.0));
    // 60px viewport, region pinned for 120px of scrolling.
    let source = ScrollProgressSource::new(0.0, 180.0, ["a", "b"]);
    let mut sim = Simulation::new()
        .with_registry(registry)
        .with_particle_count(100)
        .with_surface_size(80.0, 60.0)
        .with_transition_mode(TransitionMode::ScrollLinked)
        .with_source(source)
        .build();

    sim.frame(DT);
    assert_eq!(sim.params().modes(), Vec2::new(2.0, 3.0));

    sim.schedule(Signal::ScrollTo(60.0));
    sim.frame(DT);
    let mid = sim.params().modes();
    assert!((mid - Vec2::new(3.0, 5.0)).length() < 1e-4, "{}", mid);

    sim.schedule(Signal::ScrollTo(120.0));
    sim.frame(DT);
    assert_eq!(sim.params().modes(), Vec2::new(4.0, 7.0));

    // Scrub back.
    sim.schedule(Signal::ScrollTo(0.0));
    sim.frame(DT);
    assert_eq!(sim.params().modes(), Vec2::new(2.0, 3.0));
}

#[test]
fn scene_file_round_trip() {
    let dir = std::env::temp_dir().join(format!("nodal-scene-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("scene.json");
    std::fs::write(&path, serde_json::to_string(&SceneConfig::default()).unwrap()).unwrap();

    let scene = SceneConfig::load(&path).unwrap();
    assert_eq!(scene, SceneConfig::default());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn disposed_instance_ignores_everything() {
    let mut sim = sim(100);
    sim.dispose();
    sim.schedule(Signal::Target("features".into()));
    assert!(!sim.frame(DT));
    assert_eq!(sim.transition().target_id(), "hero");
    assert!(sim.is_disposed());
}
