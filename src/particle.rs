use egui::{Color32, Pos2, Vec2};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::ParticleConfig;

/// A short-lived decorative dot shed by the brush
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Pos2,
    /// Pixels per reference tick
    pub velocity: Vec2,
    /// Alpha is baked in
    pub color: Color32,
    pub size: f32,
    pub lifetime_ms: u64,
    pub age_ms: u64,
}

impl Particle {
    pub fn is_expired(&self) -> bool {
        self.age_ms >= self.lifetime_ms
    }
}

/// Spawn and integration rules, shared by the live canvas and the exporter
#[derive(Debug, Clone)]
pub struct ParticleEmitter {
    config: ParticleConfig,
}

impl Default for ParticleEmitter {
    fn default() -> Self {
        Self::new(ParticleConfig::default())
    }
}

impl ParticleEmitter {
    pub fn new(config: ParticleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    /// Spawns between 1 and `max_spawn` particles at `at`, tinted by `color`
    pub fn spawn<R: Rng + ?Sized>(&self, rng: &mut R, at: Pos2, color: Color32) -> Vec<Particle> {
        let config = &self.config;
        let count = rng.gen_range(1..=config.max_spawn.max(1));
        let speed = config.velocity_range.abs();
        let [r, g, b, _] = color.to_srgba_unmultiplied();
        let (min_life, max_life) = ordered(config.min_lifetime_ms, config.max_lifetime_ms);

        (0..count)
            .map(|_| {
                let velocity = Vec2::new(
                    rng.gen_range(-speed..=speed) as f32,
                    rng.gen_range(-speed..=speed) as f32,
                );
                let (lo, hi) = config.alpha_bands.choose(rng).copied().unwrap_or((255, 255));
                let (lo, hi) = ordered(lo, hi);
                let alpha = rng.gen_range(lo..=hi);
                let (lo, hi) = config.size_bands.choose(rng).copied().unwrap_or((3.0, 3.0));
                let (lo, hi) = ordered(lo, hi);
                let size = if lo < hi { rng.gen_range(lo..=hi) } else { lo };

                Particle {
                    position: at,
                    velocity,
                    color: Color32::from_rgba_unmultiplied(r, g, b, alpha),
                    size,
                    lifetime_ms: rng.gen_range(min_life..=max_life),
                    age_ms: 0,
                }
            })
            .collect()
    }

    /// Moves every particle by `delta_ms` worth of velocity, ages it, and
    /// drops the ones that reached their lifetime
    pub fn advance(&self, particles: &mut Vec<Particle>, delta_ms: u64) {
        let scale = delta_ms as f32 / self.config.reference_tick_ms.max(1) as f32;
        particles.retain_mut(|particle| {
            particle.position += particle.velocity * scale;
            particle.age_ms = particle.age_ms.saturating_add(delta_ms);
            !particle.is_expired()
        });
    }
}

fn ordered<T: PartialOrd>(a: T, b: T) -> (T, T) {
    if a <= b { (a, b) } else { (b, a) }
}

struct FieldState {
    particles: Vec<Particle>,
    rng: StdRng,
    /// Set while a [`ParticleTicker`] is parked on this field
    waker: Option<Sender<TickSignal>>,
}

/// The live particle list, guarded by a single lock shared between the
/// pointer input path and the simulation tick
#[derive(Clone)]
pub struct ParticleField {
    state: Arc<Mutex<FieldState>>,
    emitter: Arc<ParticleEmitter>,
}

impl std::fmt::Debug for ParticleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticleField")
            .field("particles", &format!("<{} particles>", self.len()))
            .finish()
    }
}

impl ParticleField {
    pub fn new(emitter: ParticleEmitter) -> Self {
        Self::with_rng(emitter, StdRng::from_entropy())
    }

    pub fn with_seed(emitter: ParticleEmitter, seed: u64) -> Self {
        Self::with_rng(emitter, StdRng::seed_from_u64(seed))
    }

    fn with_rng(emitter: ParticleEmitter, rng: StdRng) -> Self {
        Self {
            state: Arc::new(Mutex::new(FieldState {
                particles: Vec::new(),
                rng,
                waker: None,
            })),
            emitter: Arc::new(emitter),
        }
    }

    pub fn spawn(&self, at: Pos2, color: Color32) {
        let mut state = self.state.lock();
        let FieldState {
            particles,
            rng,
            waker,
        } = &mut *state;
        let was_empty = particles.is_empty();
        let spawned = self.emitter.spawn(rng, at, color);
        particles.extend(spawned);
        if was_empty {
            if let Some(waker) = waker {
                // a stopped ticker just leaves the signal unread
                let _ = waker.send(TickSignal::Wake);
            }
        }
    }

    pub fn advance(&self, delta_ms: u64) -> usize {
        let mut state = self.state.lock();
        self.emitter.advance(&mut state.particles, delta_ms);
        state.particles.len()
    }

    pub fn snapshot(&self) -> Vec<Particle> {
        self.state.lock().particles.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.state.lock().particles.clear();
    }
}

enum TickSignal {
    Wake,
    Stop,
}

/// Drives a [`ParticleField`] on a fixed wall-clock tick in the background.
///
/// After each update the `on_tick` hand-off runs with the number of live
/// particles; hosts use it to schedule a repaint on their UI context. The
/// tick parks while the field is empty and resumes on the next spawn.
pub struct ParticleTicker {
    field: ParticleField,
    control: Sender<TickSignal>,
    thread: Option<JoinHandle<()>>,
}

impl ParticleTicker {
    pub fn spawn<F>(field: ParticleField, tick: Duration, mut on_tick: F) -> std::io::Result<Self>
    where
        F: FnMut(usize) + Send + 'static,
    {
        let (control, signals) = mpsc::channel();
        field.state.lock().waker = Some(control.clone());

        let tick_field = field.clone();
        let thread = std::thread::Builder::new()
            .name("particle-tick".to_string())
            .spawn(move || {
                log::debug!("Particle ticker started ({:?} tick)", tick);
                let mut last = Instant::now();
                let mut active = !tick_field.is_empty();
                loop {
                    let signal = if active {
                        signals.recv_timeout(tick)
                    } else {
                        signals.recv().map_err(|_| RecvTimeoutError::Disconnected)
                    };
                    match signal {
                        Ok(TickSignal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                        Ok(TickSignal::Wake) if !active => last = Instant::now(),
                        Ok(TickSignal::Wake) | Err(RecvTimeoutError::Timeout) => {}
                    }

                    let now = Instant::now();
                    let delta_ms = now.duration_since(last).as_millis() as u64;
                    last = now;

                    let alive = tick_field.advance(delta_ms);
                    // the hand-off after the field empties lets the host
                    // clear the final frame
                    on_tick(alive);
                    active = alive > 0;
                }
                log::debug!("Particle ticker stopped");
            })?;

        Ok(Self {
            field,
            control,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stops the tick and waits for it; returns without waiting out a tick
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.field.state.lock().waker = None;
        let _ = self.control.send(TickSignal::Stop);
        if thread.join().is_err() {
            log::error!("Particle ticker thread panicked");
        }
    }
}

impl Drop for ParticleTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
