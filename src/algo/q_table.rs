use crate::grid::StateIndex;

/// Dense table of action values, one row per grid cell
///
/// Indices are trusted: the [`Grid`](crate::grid::Grid) guarantees valid state indices and the
/// environment guarantees valid actions, so any out-of-range access panics.
#[derive(Debug, Clone, PartialEq)]
pub struct QTable {
    values: Vec<f64>,
    state_count: usize,
    action_count: usize,
}

impl QTable {
    /// Zero-initialized table of shape `[state_count, action_count]`
    pub fn new(state_count: usize, action_count: usize) -> Self {
        assert!(action_count > 0, "A Q-table needs at least one action");
        Self {
            values: vec![0.0; state_count * action_count],
            state_count,
            action_count,
        }
    }

    /// Build a table from row-major values
    ///
    /// **Returns** `None` if `values.len()` does not match the shape
    pub fn from_raw(state_count: usize, action_count: usize, values: Vec<f64>) -> Option<Self> {
        (action_count > 0 && values.len() == state_count * action_count).then_some(Self {
            values,
            state_count,
            action_count,
        })
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    pub fn action_count(&self) -> usize {
        self.action_count
    }

    /// Row-major view of all values
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn row(&self, state: StateIndex) -> &[f64] {
        let start = self.row_start(state);
        &self.values[start..start + self.action_count]
    }

    pub fn row_mut(&mut self, state: StateIndex) -> &mut [f64] {
        let start = self.row_start(state);
        &mut self.values[start..start + self.action_count]
    }

    pub fn get(&self, state: StateIndex, action: usize) -> f64 {
        self.values[self.offset(state, action)]
    }

    pub fn set(&mut self, state: StateIndex, action: usize, value: f64) {
        let ix = self.offset(state, action);
        self.values[ix] = value;
    }

    /// Greedy action for `state`; ties go to the lowest action index
    pub fn best_action(&self, state: StateIndex) -> usize {
        self.row(state)
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(best, max), (a, &q)| {
                if q > max {
                    (a, q)
                } else {
                    (best, max)
                }
            })
            .0
    }

    pub fn best_value(&self, state: StateIndex) -> f64 {
        self.row(state)
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Multiply every action value of `state` by `factor`
    pub fn scale_row(&mut self, state: StateIndex, factor: f64) {
        self.row_mut(state).iter_mut().for_each(|q| *q *= factor);
    }

    /// Number of states with at least one non-zero action value
    pub fn visited_states(&self) -> usize {
        self.values
            .chunks(self.action_count)
            .filter(|row| row.iter().any(|&q| q != 0.0))
            .count()
    }

    fn row_start(&self, state: StateIndex) -> usize {
        assert!(
            state < self.state_count,
            "State index {state} out of bounds for {} states",
            self.state_count
        );
        state * self.action_count
    }

    fn offset(&self, state: StateIndex, action: usize) -> usize {
        assert!(
            action < self.action_count,
            "Action index {action} out of bounds for {} actions",
            self.action_count
        );
        self.row_start(state) + action
    }
}
