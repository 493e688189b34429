//! Analyses: the [`Analysis`] trait, the built-ins, and descriptor-driven
//! observable analyses.
//!
//! Every analysis keeps one set of histograms or counters per weight stream
//! and fills all of them for every event, each with its own weight.

use std::fmt;

use serde::{Deserialize, Serialize};

use ntuple_graph_core::EventGraph;
use ntuple_graph_core::graph::Particle;

use crate::error::AnalysisResult;
use crate::histogram::{Counter, Histo1D};

/// Cross-section and event count per weight.
pub const MC_XS: &str = "MC_XS";
/// Final-state multiplicity per weight.
pub const MC_MULTIPLICITY: &str = "MC_MULTIPLICITY";
/// Final-state transverse momentum and pseudorapidity per weight.
pub const MC_FINALSTATE: &str = "MC_FINALSTATE";

/// Names of the built-in analyses.
pub const BUILTINS: [&str; 3] = [MC_XS, MC_MULTIPLICITY, MC_FINALSTATE];

/// One analysis run by the handler.
pub trait Analysis: fmt::Debug + Send {
    /// Registered name.
    fn name(&self) -> &str;

    /// Prepare per-weight state; called once, before the first event.
    fn init(&mut self, weight_names: &[String]);

    /// Fill from one event.
    fn analyze(&mut self, event: &EventGraph);

    /// Close the run.
    fn finalize(&mut self) {}

    /// Results so far.
    fn report(&self) -> Report;
}

/// A value tagged with the weight stream it was filled with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weighted<T> {
    /// Weight stream name.
    pub weight: String,
    /// The value.
    #[serde(flatten)]
    pub value: T,
}

/// A named observable with one histogram per weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoReport {
    /// Histogram name.
    pub name: String,
    /// One histogram per weight stream.
    pub per_weight: Vec<Weighted<Histo1D>>,
}

/// A named counter with one value per weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterReport {
    /// Counter name.
    pub name: String,
    /// One counter per weight stream.
    pub per_weight: Vec<Weighted<Counter>>,
}

/// A derived value with its statistical uncertainty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Estimate {
    /// Central value.
    pub value: f64,
    /// Uncertainty.
    pub error: f64,
}

/// A named estimate with one value per weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimateReport {
    /// Estimate name.
    pub name: String,
    /// One estimate per weight stream.
    pub per_weight: Vec<Weighted<Estimate>>,
}

/// Everything one analysis produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    /// Histograms, in declaration order.
    pub histograms: Vec<HistoReport>,
    /// Counters, in declaration order.
    pub counters: Vec<CounterReport>,
    /// Values derived at finalize.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub estimates: Vec<EstimateReport>,
}

fn tag<T: Clone>(names: &[String], values: &[T]) -> Vec<Weighted<T>> {
    names
        .iter()
        .zip(values)
        .map(|(weight, value)| Weighted {
            weight: weight.clone(),
            value: value.clone(),
        })
        .collect()
}

/// `MC_XS`: sum of weights per stream and, once finalized, the mean event
/// weight `sumw / N` with uncertainty `sqrt(sumw2) / N`.
///
/// With event weights in pb the mean weight is the cross-section.
#[derive(Debug, Default)]
pub struct CrossSection {
    names: Vec<String>,
    sums: Vec<Counter>,
    estimates: Vec<Estimate>,
}

impl Analysis for CrossSection {
    fn name(&self) -> &str {
        MC_XS
    }

    fn init(&mut self, weight_names: &[String]) {
        self.names = weight_names.to_vec();
        self.sums = vec![Counter::default(); weight_names.len()];
    }

    fn analyze(&mut self, event: &EventGraph) {
        for (sum, w) in self.sums.iter_mut().zip(event.weights().values()) {
            sum.fill(*w);
        }
    }

    fn finalize(&mut self) {
        self.estimates = self
            .sums
            .iter()
            .map(|sum| match sum.entries {
                0 => Estimate::default(),
                n => Estimate {
                    value: sum.sumw / n as f64,
                    error: sum.error() / n as f64,
                },
            })
            .collect();
    }

    fn report(&self) -> Report {
        let estimates = if self.estimates.is_empty() {
            Vec::new()
        } else {
            vec![EstimateReport {
                name: "cross_section".to_string(),
                per_weight: tag(&self.names, &self.estimates),
            }]
        };
        Report {
            histograms: Vec::new(),
            counters: vec![CounterReport {
                name: "sumw".to_string(),
                per_weight: tag(&self.names, &self.sums),
            }],
            estimates,
        }
    }
}

/// Quantity an observable histogram is filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Observable {
    /// Number of selected final-state particles, once per event.
    Multiplicity,
    /// Transverse momentum of each selected particle.
    Pt,
    /// Pseudorapidity of each selected particle.
    Eta,
    /// Energy of each selected particle.
    Energy,
    /// Invariant mass of each selected particle.
    Mass,
}

impl Observable {
    /// Name used in descriptors and output.
    pub fn as_str(self) -> &'static str {
        match self {
            Observable::Multiplicity => "multiplicity",
            Observable::Pt => "pt",
            Observable::Eta => "eta",
            Observable::Energy => "energy",
            Observable::Mass => "mass",
        }
    }

    fn per_particle(self, p: &Particle) -> f64 {
        match self {
            Observable::Multiplicity => 1.0,
            Observable::Pt => p.momentum.pt(),
            Observable::Eta => p.momentum.eta(),
            Observable::Energy => p.momentum.e,
            Observable::Mass => p.momentum.mass(),
        }
    }
}

fn selected(pdg_id: Option<i32>, event: &EventGraph) -> impl Iterator<Item = &Particle> + '_ {
    event
        .final_state()
        .filter(move |p| pdg_id.is_none_or(|id| p.pdg_id == id))
}

/// One histogram definition of an [`ObservableAnalysis`].
#[derive(Debug, Clone)]
pub struct HistoSpec {
    name: String,
    observable: Observable,
    prototype: Histo1D,
}

impl HistoSpec {
    /// `bins` uniform bins over `[min, max)`.
    pub fn new(
        name: &str,
        observable: Observable,
        bins: usize,
        min: f64,
        max: f64,
    ) -> AnalysisResult<Self> {
        Ok(Self {
            name: name.to_string(),
            observable,
            prototype: Histo1D::uniform(name, bins, min, max)?,
        })
    }
}

/// Histograms of final-state observables, optionally restricted to one
/// particle species.
#[derive(Debug)]
pub struct ObservableAnalysis {
    name: String,
    pdg_id: Option<i32>,
    normalize: bool,
    specs: Vec<HistoSpec>,
    names: Vec<String>,
    // [spec][weight]
    histos: Vec<Vec<Histo1D>>,
}

impl ObservableAnalysis {
    /// An analysis filling `specs` from final-state particles.
    pub fn new(name: &str, specs: Vec<HistoSpec>, pdg_id: Option<i32>) -> Self {
        Self {
            name: name.to_string(),
            pdg_id,
            normalize: false,
            histos: vec![Vec::new(); specs.len()],
            specs,
            names: Vec::new(),
        }
    }

    /// Scale every histogram to unit area at finalize when `normalize` is set.
    pub fn normalized(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// `MC_MULTIPLICITY`.
    pub fn multiplicity() -> AnalysisResult<Self> {
        let spec = HistoSpec::new("multiplicity", Observable::Multiplicity, 50, -0.5, 49.5)?;
        Ok(Self::new(MC_MULTIPLICITY, vec![spec], None))
    }

    /// `MC_FINALSTATE`.
    pub fn final_state() -> AnalysisResult<Self> {
        let specs = vec![
            HistoSpec::new("pt", Observable::Pt, 50, 0.0, 500.0)?,
            HistoSpec::new("eta", Observable::Eta, 40, -5.0, 5.0)?,
        ];
        Ok(Self::new(MC_FINALSTATE, specs, None))
    }
}

impl Analysis for ObservableAnalysis {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, weight_names: &[String]) {
        self.names = weight_names.to_vec();
        self.histos = self
            .specs
            .iter()
            .map(|s| vec![s.prototype.clone(); weight_names.len()])
            .collect();
    }

    fn analyze(&mut self, event: &EventGraph) {
        let weights = event.weights().values();
        for (spec, histos) in self.specs.iter().zip(self.histos.iter_mut()) {
            match spec.observable {
                Observable::Multiplicity => {
                    let n = selected(self.pdg_id, event).count() as f64;
                    for (h, w) in histos.iter_mut().zip(weights) {
                        h.fill(n, *w);
                    }
                }
                observable => {
                    for p in selected(self.pdg_id, event) {
                        let x = observable.per_particle(p);
                        for (h, w) in histos.iter_mut().zip(weights) {
                            h.fill(x, *w);
                        }
                    }
                }
            }
        }
    }

    fn finalize(&mut self) {
        if !self.normalize {
            return;
        }
        for h in self.histos.iter_mut().flatten() {
            let area = h.integral();
            if area != 0.0 {
                h.scale(1.0 / area);
            }
        }
    }

    fn report(&self) -> Report {
        let histograms = self
            .specs
            .iter()
            .zip(&self.histos)
            .map(|(spec, histos)| HistoReport {
                name: spec.name.clone(),
                per_weight: tag(&self.names, histos),
            })
            .collect();
        Report {
            histograms,
            counters: Vec::new(),
            estimates: Vec::new(),
        }
    }
}

/// A built-in analysis by name.
pub fn builtin(name: &str) -> Option<AnalysisResult<Box<dyn Analysis>>> {
    let analysis: AnalysisResult<Box<dyn Analysis>> = match name {
        MC_XS => Ok(Box::new(CrossSection::default())),
        MC_MULTIPLICITY => ObservableAnalysis::multiplicity().map(|a| Box::new(a) as Box<dyn Analysis>),
        MC_FINALSTATE => ObservableAnalysis::final_state().map(|a| Box::new(a) as Box<dyn Analysis>),
        _ => return None,
    };
    Some(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntuple_graph_core::WeightRow;
    use ntuple_graph_core::graph::{FourMomentum, ParticleStatus};
    use std::sync::Arc;

    fn event(particles: &[(i32, FourMomentum)], weights: &[f64]) -> EventGraph {
        let mut g = EventGraph::new();
        let v = g.add_vertex();
        for (pdg, p) in particles {
            g.add_particle_out(v, Particle::new(*p, *pdg, ParticleStatus::Final));
        }
        let names: Arc<[String]> = (0..weights.len()).map(|i| format!("w{i}")).collect();
        g.set_weights(&WeightRow::from_parts(names, weights.to_vec()));
        g
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("w{i}")).collect()
    }

    #[test]
    fn cross_section_sums_each_weight_stream() {
        let mut xs = CrossSection::default();
        xs.init(&names(2));
        xs.analyze(&event(&[], &[1.0, 2.0]));
        xs.analyze(&event(&[], &[0.5, -1.0]));

        let report = xs.report();
        let sums = &report.counters[0].per_weight;
        assert_eq!(sums[0].weight, "w0");
        assert_eq!(sums[0].value.sumw, 1.5);
        assert_eq!(sums[1].value.sumw, 1.0);
        assert_eq!(sums[1].value.entries, 2);
        assert!(report.estimates.is_empty());
    }

    #[test]
    fn cross_section_is_the_mean_weight_at_finalize() {
        let mut xs = CrossSection::default();
        xs.init(&names(2));
        for w in [3.0, 1.0, 2.0, 2.0] {
            xs.analyze(&event(&[], &[w, 0.0]));
        }
        xs.finalize();

        let report = xs.report();
        assert_eq!(report.estimates[0].name, "cross_section");
        let per_weight = &report.estimates[0].per_weight;
        // sumw = 8, sumw2 = 18, N = 4
        assert_eq!(per_weight[0].value.value, 2.0);
        assert_eq!(per_weight[0].value.error, 18f64.sqrt() / 4.0);
        assert_eq!(per_weight[1].value, Estimate::default());
    }

    #[test]
    fn multiplicity_fills_once_per_event() {
        let mut a = ObservableAnalysis::multiplicity().unwrap();
        a.init(&names(1));
        let p = FourMomentum::new(1.0, 0.0, 0.0, 1.0);
        a.analyze(&event(&[(22, p), (22, p), (211, p)], &[2.0]));
        a.analyze(&event(&[], &[1.0]));

        let report = a.report();
        let h = &report.histograms[0].per_weight[0].value;
        assert_eq!(h.entries, 2);
        assert_eq!(h.sumw[3], 2.0);
        assert_eq!(h.sumw[0], 1.0);
    }

    #[test]
    fn species_filter_restricts_particles() {
        let spec = HistoSpec::new("energy", Observable::Energy, 10, 0.0, 10.0).unwrap();
        let mut a = ObservableAnalysis::new("photons", vec![spec], Some(22));
        a.init(&names(2));
        a.analyze(&event(
            &[
                (22, FourMomentum::new(0.0, 0.0, 2.5, 2.5)),
                (211, FourMomentum::new(0.0, 0.0, 7.5, 7.5)),
            ],
            &[1.0, 3.0],
        ));

        let report = a.report();
        let per_weight = &report.histograms[0].per_weight;
        assert_eq!(per_weight[0].value.sumw[2], 1.0);
        assert_eq!(per_weight[1].value.sumw[2], 3.0);
        assert_eq!(per_weight[1].value.sumw[7], 0.0);
    }

    #[test]
    fn normalized_histograms_have_unit_area() {
        let spec = HistoSpec::new("mass", Observable::Mass, 4, 0.0, 4.0).unwrap();
        let mut a = ObservableAnalysis::new("masses", vec![spec], None).normalized(true);
        a.init(&names(2));
        let heavy = FourMomentum::new(0.0, 0.0, 4.0, 5.0);
        let light = FourMomentum::new(0.0, 0.0, 1.0, 1.0);
        a.analyze(&event(&[(23, heavy), (22, light)], &[2.0, 0.0]));
        a.analyze(&event(&[(23, heavy)], &[2.0, 0.0]));
        a.finalize();

        let report = a.report();
        let h = &report.histograms[0].per_weight[0].value;
        // masses 3, 0, 3
        assert_eq!(h.sumw, vec![1.0 / 3.0, 0.0, 0.0, 2.0 / 3.0]);
        assert_eq!(h.integral(), 1.0);
        // an all-zero stream stays empty rather than dividing by zero
        let empty = &report.histograms[0].per_weight[1].value;
        assert!(empty.sumw.iter().all(|w| *w == 0.0));
    }

    #[test]
    fn builtins_resolve_by_exact_name() {
        for name in BUILTINS {
            let analysis = builtin(name).unwrap().unwrap();
            assert_eq!(analysis.name(), name);
        }
        assert!(builtin("mc_xs").is_none());
    }
}
