use std::fmt;

use pl_core::Variable;
use serde::Serialize;

use crate::panel::PanelDataset;

/// Observed bounds of one variable, used to bound simulation inputs.
///
/// The range is advisory: predictions outside it extrapolate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VariableRange {
    /// Smallest observed value.
    pub min: f64,
    /// Arithmetic mean (default simulation input).
    pub mean: f64,
    /// Largest observed value.
    pub max: f64,
}

impl VariableRange {
    /// Range of `values`; all fields are `NaN` for empty input.
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self { min: f64::NAN, mean: f64::NAN, max: f64::NAN };
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Self { min, mean, max }
    }

    /// Whether `x` lies within `[min, max]`.
    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }
}

/// Per-variable descriptive statistics (count, mean, std, min, quartiles, max).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    /// Summarized variable.
    pub variable: Variable,
    /// Number of observations.
    pub count: usize,
    /// Mean.
    pub mean: f64,
    /// Sample standard deviation (n − 1); `NaN` for a single observation.
    pub std: f64,
    /// Minimum.
    pub min: f64,
    /// First quartile.
    pub q25: f64,
    /// Median.
    pub q50: f64,
    /// Third quartile.
    pub q75: f64,
    /// Maximum.
    pub max: f64,
}

/// Descriptive statistics for every measurement variable of `dataset`.
pub fn describe(dataset: &PanelDataset) -> Vec<ColumnSummary> {
    Variable::ALL.into_iter().map(|v| summarize(v, &dataset.column(v))).collect()
}

fn summarize(variable: Variable, values: &[f64]) -> ColumnSummary {
    let n = values.len();
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mean = if n > 0 { values.iter().sum::<f64>() / n as f64 } else { f64::NAN };
    let std = if n > 1 {
        let ss: f64 = values.iter().map(|x| (x - mean) * (x - mean)).sum();
        (ss / (n - 1) as f64).sqrt()
    } else {
        f64::NAN
    };
    ColumnSummary {
        variable,
        count: n,
        mean,
        std,
        min: quantile_linear_sorted(&sorted, 0.0),
        q25: quantile_linear_sorted(&sorted, 0.25),
        q50: quantile_linear_sorted(&sorted, 0.5),
        q75: quantile_linear_sorted(&sorted, 0.75),
        max: quantile_linear_sorted(&sorted, 1.0),
    }
}

/// Quantile of sorted data via linear interpolation; `NaN` for empty input.
fn quantile_linear_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let i = pos.floor() as usize;
    let j = pos.ceil() as usize;
    let t = pos - i as f64;
    (1.0 - t) * sorted[i] + t * sorted[j]
}

/// Renders a `describe()` result as a fixed-width table, one row per statistic.
pub struct DescribeTable<'a>(pub &'a [ColumnSummary]);

impl fmt::Display for DescribeTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6}", "")?;
        for s in self.0 {
            write!(f, "{:>16}", s.variable.label())?;
        }
        writeln!(f)?;

        let rows: [(&str, fn(&ColumnSummary) -> f64); 8] = [
            ("count", |s| s.count as f64),
            ("mean", |s| s.mean),
            ("std", |s| s.std),
            ("min", |s| s.min),
            ("25%", |s| s.q25),
            ("50%", |s| s.q50),
            ("75%", |s| s.q75),
            ("max", |s| s.max),
        ];
        for (name, get) in rows {
            write!(f, "{name:<6}")?;
            for s in self.0 {
                write!(f, "{:>16.4}", get(s))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::Observation;
    use approx::assert_relative_eq;

    fn dataset(lines: &[f64]) -> PanelDataset {
        let obs = lines
            .iter()
            .enumerate()
            .map(|(i, &y)| Observation {
                entity_id: "1".into(),
                period: 2000 + i as i32,
                values: [y, 60.0 + i as f64, 50.0, 1000.0, 5.0, 100.0],
            })
            .collect();
        PanelDataset::from_observations(obs).unwrap()
    }

    #[test]
    fn test_describe_matches_hand_computation() {
        let ds = dataset(&[1.0, 2.0, 3.0, 4.0]);
        let stats = describe(&ds);
        assert_eq!(stats.len(), 6);
        let y = &stats[Variable::PovertyLine.index()];
        assert_eq!(y.count, 4);
        assert_relative_eq!(y.mean, 2.5);
        assert_relative_eq!(y.std, (5.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(y.min, 1.0);
        assert_relative_eq!(y.q25, 1.75);
        assert_relative_eq!(y.q50, 2.5);
        assert_relative_eq!(y.q75, 3.25);
        assert_relative_eq!(y.max, 4.0);

        let lfpr = &stats[Variable::LaborForceParticipationRate.index()];
        assert_relative_eq!(lfpr.std, 0.0);
    }

    #[test]
    fn test_single_observation_std_is_nan() {
        let stats = describe(&dataset(&[7.0]));
        assert!(stats[0].std.is_nan());
        assert_eq!(stats[0].q75, 7.0);
    }

    #[test]
    fn test_range() {
        let ds = dataset(&[3.0, 1.0, 2.0]);
        let r = ds.range(Variable::PovertyLine);
        assert_eq!(r.min, 1.0);
        assert_eq!(r.max, 3.0);
        assert_relative_eq!(r.mean, 2.0);
        assert!(r.contains(2.5));
        assert!(!r.contains(3.5));
        assert!(VariableRange::of(&[]).mean.is_nan());
    }

    #[test]
    fn test_table_render_has_all_rows() {
        let ds = dataset(&[1.0, 2.0]);
        let text = DescribeTable(&describe(&ds)).to_string();
        for label in ["count", "mean", "std", "min", "25%", "50%", "75%", "max", "HDI", "MinWage"] {
            assert!(text.contains(label), "missing {label} in\n{text}");
        }
    }
}
