//! Event graphs and the builder that fills them from primary rows.
//!
//! An [`EventGraph`] is a production-vertex-centred record of one event:
//! two incoming beam particles, one vertex, the outgoing final state, and the
//! event's weights. Particles and vertices live in arenas owned by the graph
//! and are addressed by index, so one graph can be cleared and refilled for
//! every row without freeing its storage.

use serde::Deserialize;

use crate::reader::PrimaryRow;
use crate::weights::WeightRow;

/// PDG code of the proton.
pub const PROTON: i32 = 2212;

/// Default energy per beam, in GeV.
pub const DEFAULT_BEAM_ENERGY: f64 = 6500.0;

/// Momentum unit of every graph.
pub const MOMENTUM_UNIT: &str = "GeV";

/// Length unit of every graph.
pub const LENGTH_UNIT: &str = "mm";

/// A four-momentum `(px, py, pz, E)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FourMomentum {
    /// x component.
    pub px: f64,
    /// y component.
    pub py: f64,
    /// z component (beam axis).
    pub pz: f64,
    /// Energy.
    pub e: f64,
}

impl FourMomentum {
    /// Build from components.
    pub const fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }

    /// Magnitude of the three-momentum.
    pub fn p(&self) -> f64 {
        (self.px * self.px + self.py * self.py + self.pz * self.pz).sqrt()
    }

    /// Invariant mass; negative mass-squared (from rounding) gives a negative value.
    pub fn mass(&self) -> f64 {
        let m2 = self.e * self.e - self.p().powi(2);
        m2.signum() * m2.abs().sqrt()
    }

    /// Pseudorapidity; infinite along the beam axis.
    pub fn eta(&self) -> f64 {
        let p = self.p();
        let pt = self.pt();
        if pt == 0.0 {
            return if self.pz >= 0.0 { f64::INFINITY } else { f64::NEG_INFINITY };
        }
        ((p + self.pz) / pt).ln()
    }
}

/// Particle status codes, numbered as in HepMC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleStatus {
    /// Final state, undecayed.
    Final = 1,
    /// Incoming beam particle.
    Beam = 4,
}

/// Index of a particle in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleId(usize);

/// Index of a vertex in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexId(usize);

/// One particle of an event graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Four-momentum in GeV.
    pub momentum: FourMomentum,
    /// PDG species code.
    pub pdg_id: i32,
    /// Status code.
    pub status: ParticleStatus,
    /// Generated mass, when set explicitly.
    pub generated_mass: Option<f64>,
    /// Vertex that produced the particle.
    pub production_vertex: Option<VertexId>,
    /// Vertex the particle enters.
    pub end_vertex: Option<VertexId>,
}

impl Particle {
    /// A particle not yet attached to any vertex.
    pub fn new(momentum: FourMomentum, pdg_id: i32, status: ParticleStatus) -> Self {
        Self {
            momentum,
            pdg_id,
            status,
            generated_mass: None,
            production_vertex: None,
            end_vertex: None,
        }
    }
}

/// A vertex with its incoming and outgoing particles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vertex {
    incoming: Vec<ParticleId>,
    outgoing: Vec<ParticleId>,
}

impl Vertex {
    /// Particles entering the vertex.
    pub fn incoming(&self) -> &[ParticleId] {
        &self.incoming
    }

    /// Particles leaving the vertex.
    pub fn outgoing(&self) -> &[ParticleId] {
        &self.outgoing
    }
}

/// One event as a graph of particles and vertices.
#[derive(Debug, Clone, Default)]
pub struct EventGraph {
    event_number: i64,
    particles: Vec<Particle>,
    vertices: Vec<Vertex>,
    live_vertices: usize,
    beams: Option<(ParticleId, ParticleId)>,
    weights: WeightRow,
    multiplicity_hint: Option<i32>,
}

impl EventGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all particles, vertices and weights, keeping allocations.
    pub fn clear(&mut self) {
        self.event_number = 0;
        self.particles.clear();
        // Vertex slots beyond `live_vertices` keep their buffers for reuse.
        self.live_vertices = 0;
        self.beams = None;
        self.weights.clear();
        self.multiplicity_hint = None;
    }

    /// Event number.
    pub fn event_number(&self) -> i64 {
        self.event_number
    }

    /// Set the event number.
    pub fn set_event_number(&mut self, n: i64) {
        self.event_number = n;
    }

    /// Add an empty vertex.
    pub fn add_vertex(&mut self) -> VertexId {
        match self.vertices.get_mut(self.live_vertices) {
            Some(v) => {
                v.incoming.clear();
                v.outgoing.clear();
            }
            None => self.vertices.push(Vertex::default()),
        }
        self.live_vertices += 1;
        VertexId(self.live_vertices - 1)
    }

    fn push_particle(&mut self, particle: Particle) -> ParticleId {
        self.particles.push(particle);
        ParticleId(self.particles.len() - 1)
    }

    /// Add `particle` as incoming to `vertex`.
    pub fn add_particle_in(&mut self, vertex: VertexId, mut particle: Particle) -> ParticleId {
        particle.end_vertex = Some(vertex);
        let id = self.push_particle(particle);
        self.vertices[vertex.0].incoming.push(id);
        id
    }

    /// Add `particle` as outgoing from `vertex`.
    pub fn add_particle_out(&mut self, vertex: VertexId, mut particle: Particle) -> ParticleId {
        particle.production_vertex = Some(vertex);
        let id = self.push_particle(particle);
        self.vertices[vertex.0].outgoing.push(id);
        id
    }

    /// Mark the two beam particles.
    pub fn set_beam_particles(&mut self, a: ParticleId, b: ParticleId) {
        self.beams = Some((a, b));
    }

    /// The beam particles, if set.
    pub fn beam_particles(&self) -> Option<(&Particle, &Particle)> {
        let (a, b) = self.beams?;
        Some((self.particle(a), self.particle(b)))
    }

    /// Particle by id.
    pub fn particle(&self, id: ParticleId) -> &Particle {
        &self.particles[id.0]
    }

    /// All particles, beams included.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// All vertices.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices[..self.live_vertices]
    }

    /// Final-state particles.
    pub fn final_state(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.particles
            .iter()
            .filter(|p| p.status == ParticleStatus::Final)
    }

    /// Event weights, in weight-stream order.
    pub fn weights(&self) -> &WeightRow {
        &self.weights
    }

    /// Replace the weights.
    pub fn set_weights(&mut self, weights: &WeightRow) {
        self.weights.copy_from(weights);
    }

    /// Multiplicity hint carried by the input row, if any.
    pub fn multiplicity_hint(&self) -> Option<i32> {
        self.multiplicity_hint
    }

    /// Set the multiplicity hint.
    pub fn set_multiplicity_hint(&mut self, hint: Option<i32>) {
        self.multiplicity_hint = hint;
    }
}

/// Beam settings for the incoming particles.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BeamConfig {
    /// Energy of each beam in GeV; beams are treated as massless.
    pub energy: f64,
    /// PDG code of the beam particles.
    pub pdg_id: i32,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            energy: DEFAULT_BEAM_ENERGY,
            pdg_id: PROTON,
        }
    }
}

/// Turns primary rows into event graphs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder {
    beam: BeamConfig,
}

impl GraphBuilder {
    /// A builder with the given beams.
    pub fn new(beam: BeamConfig) -> Self {
        Self { beam }
    }

    /// Beam settings in use.
    pub fn beam(&self) -> &BeamConfig {
        &self.beam
    }

    /// Build a fresh graph for `row`.
    pub fn build(&self, row: &PrimaryRow<'_>, weights: &WeightRow) -> EventGraph {
        let mut graph = EventGraph::new();
        self.build_into(row, weights, &mut graph);
        graph
    }

    /// Clear `graph` and fill it from `row` and `weights`.
    ///
    /// The momentum and species arrays must hold at least
    /// `row.particle_count()` entries.
    pub fn build_into(&self, row: &PrimaryRow<'_>, weights: &WeightRow, graph: &mut EventGraph) {
        graph.clear();
        graph.set_event_number(i64::from(row.id));
        graph.set_weights(weights);
        graph.set_multiplicity_hint(row.ncount);

        let v = graph.add_vertex();
        let e = self.beam.energy;
        let beam = |pz| {
            Particle::new(
                FourMomentum::new(0.0, 0.0, pz, e),
                self.beam.pdg_id,
                ParticleStatus::Beam,
            )
        };
        let b1 = graph.add_particle_in(v, beam(e));
        let b2 = graph.add_particle_in(v, beam(-e));
        graph.set_beam_particles(b1, b2);

        for i in 0..row.particle_count() {
            let momentum = FourMomentum::new(
                row.px.get(i),
                row.py.get(i),
                row.pz.get(i),
                row.energy.get(i),
            );
            let mut p = Particle::new(momentum, row.kf[i], ParticleStatus::Final);
            p.generated_mass = Some(0.0);
            graph.add_particle_out(v, p);
        }
    }
}
