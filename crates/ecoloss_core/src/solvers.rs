use crate::traits::{DynamicalSystem, Scalar, Steppable};

/// Stage nodes of the classic Runge-Kutta tableau.
const RK4_NODES: [f64; 4] = [0.0, 0.5, 0.5, 1.0];
/// Stage weights, scaled by 6.
const RK4_WEIGHTS: [f64; 4] = [1.0, 2.0, 2.0, 1.0];

/// Fixed-step classic Runge-Kutta. Each stage is evaluated at the previous
/// stage's slope, so the tableau reduces to the node list above.
pub struct RK4<T: Scalar> {
    slopes: [Vec<T>; 4],
    trial: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            slopes: std::array::from_fn(|_| vec![T::zero(); dim]),
            trial: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, s: &mut T, state: &mut [T], ds: T) {
        let s0 = *s;
        system.apply(s0, state, &mut self.slopes[0]);

        for stage in 1..RK4_NODES.len() {
            let c = T::lit(RK4_NODES[stage]);
            let (done, pending) = self.slopes.split_at_mut(stage);
            for ((out, y), k) in self.trial.iter_mut().zip(state.iter()).zip(&done[stage - 1]) {
                *out = *y + c * ds * *k;
            }
            system.apply(s0 + c * ds, &self.trial, &mut pending[0]);
        }

        let h = ds / T::lit(6.0);
        for (i, y) in state.iter_mut().enumerate() {
            let increment = RK4_WEIGHTS
                .iter()
                .zip(&self.slopes)
                .fold(T::zero(), |acc, (w, k)| acc + T::lit(*w) * k[i]);
            *y = *y + h * increment;
        }

        *s = s0 + ds;
    }
}

/// Dormand-Prince 5(4) embedded pair.
///
/// `attempt` computes a trial step and its scaled error without touching the
/// caller's state; `accept` copies the trial solution over. The step-size
/// policy lives in the caller.
pub struct DormandPrince<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    k5: Vec<T>,
    k6: Vec<T>,
    k7: Vec<T>,
    tmp: Vec<T>,
    candidate: Vec<T>,
    rtol: T,
    atol: T,
}

impl<T: Scalar> DormandPrince<T> {
    pub fn new(dim: usize, rtol: T, atol: T) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            k5: vec![z; dim],
            k6: vec![z; dim],
            k7: vec![z; dim],
            tmp: vec![z; dim],
            candidate: vec![z; dim],
            rtol,
            atol,
        }
    }

    /// Trial step of size `ds` from `(s, state)`.
    /// Returns the RMS error scaled by `atol + rtol·|y|`; `<= 1` means acceptable.
    pub fn attempt(&mut self, system: &impl DynamicalSystem<T>, s: T, state: &[T], ds: T) -> T {
        let n = state.len();

        let c2 = T::lit(1.0 / 5.0);
        let c3 = T::lit(3.0 / 10.0);
        let c4 = T::lit(4.0 / 5.0);
        let c5 = T::lit(8.0 / 9.0);

        let a21 = T::lit(1.0 / 5.0);

        let a31 = T::lit(3.0 / 40.0);
        let a32 = T::lit(9.0 / 40.0);

        let a41 = T::lit(44.0 / 45.0);
        let a42 = T::lit(-56.0 / 15.0);
        let a43 = T::lit(32.0 / 9.0);

        let a51 = T::lit(19372.0 / 6561.0);
        let a52 = T::lit(-25360.0 / 2187.0);
        let a53 = T::lit(64448.0 / 6561.0);
        let a54 = T::lit(-212.0 / 729.0);

        let a61 = T::lit(9017.0 / 3168.0);
        let a62 = T::lit(-355.0 / 33.0);
        let a63 = T::lit(46732.0 / 5247.0);
        let a64 = T::lit(49.0 / 176.0);
        let a65 = T::lit(-5103.0 / 18656.0);

        // 5th order weights (advancing solution)
        let b1 = T::lit(35.0 / 384.0);
        let b3 = T::lit(500.0 / 1113.0);
        let b4 = T::lit(125.0 / 192.0);
        let b5 = T::lit(-2187.0 / 6784.0);
        let b6 = T::lit(11.0 / 84.0);

        // 5th minus 4th order weights (error estimate)
        let e1 = T::lit(71.0 / 57600.0);
        let e3 = T::lit(-71.0 / 16695.0);
        let e4 = T::lit(71.0 / 1920.0);
        let e5 = T::lit(-17253.0 / 339200.0);
        let e6 = T::lit(22.0 / 525.0);
        let e7 = T::lit(-1.0 / 40.0);

        // k1
        system.apply(s, state, &mut self.k1);

        // k2
        for i in 0..n {
            self.tmp[i] = state[i] + ds * (a21 * self.k1[i]);
        }
        system.apply(s + c2 * ds, &self.tmp, &mut self.k2);

        // k3
        for i in 0..n {
            self.tmp[i] = state[i] + ds * (a31 * self.k1[i] + a32 * self.k2[i]);
        }
        system.apply(s + c3 * ds, &self.tmp, &mut self.k3);

        // k4
        for i in 0..n {
            self.tmp[i] = state[i] + ds * (a41 * self.k1[i] + a42 * self.k2[i] + a43 * self.k3[i]);
        }
        system.apply(s + c4 * ds, &self.tmp, &mut self.k4);

        // k5
        for i in 0..n {
            self.tmp[i] = state[i]
                + ds * (a51 * self.k1[i] + a52 * self.k2[i] + a53 * self.k3[i] + a54 * self.k4[i]);
        }
        system.apply(s + c5 * ds, &self.tmp, &mut self.k5);

        // k6
        for i in 0..n {
            self.tmp[i] = state[i]
                + ds * (a61 * self.k1[i]
                    + a62 * self.k2[i]
                    + a63 * self.k3[i]
                    + a64 * self.k4[i]
                    + a65 * self.k5[i]);
        }
        system.apply(s + ds, &self.tmp, &mut self.k6);

        // Trial solution
        for i in 0..n {
            self.candidate[i] = state[i]
                + ds * (b1 * self.k1[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]);
        }

        // k7 at the trial point, for the embedded estimate
        system.apply(s + ds, &self.candidate, &mut self.k7);

        let mut acc = T::zero();
        for i in 0..n {
            let err = ds
                * (e1 * self.k1[i]
                    + e3 * self.k3[i]
                    + e4 * self.k4[i]
                    + e5 * self.k5[i]
                    + e6 * self.k6[i]
                    + e7 * self.k7[i]);
            let sc = self.atol + self.rtol * state[i].abs().max(self.candidate[i].abs());
            let ratio = err / sc;
            acc = acc + ratio * ratio;
        }
        if n == 0 {
            return acc;
        }
        (acc / T::lit(n as f64)).sqrt()
    }

    /// Copies the last trial solution into `state`.
    pub fn accept(&self, state: &mut [T]) {
        state.copy_from_slice(&self.candidate);
    }
}
