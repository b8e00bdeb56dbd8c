//! Calculator targets and the weighted dispatch policies that pick them.
//!
//! Five calculator types implement [`Calculator`] with identical behaviour and
//! distinct identity. A call site that only ever sees one of them is
//! monomorphic; seeing two is bimorphic; three or more is megamorphic. The
//! [`DispatchPolicy`] in force decides which of these shapes the measured call
//! site has.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use tracing::info;

use crate::error::ScenarioError;
use crate::state::Sink;

/// An interchangeable arithmetic target.
pub trait Calculator: Send + Sync {
    /// Add `step` to `start`, wrapping on overflow.
    fn calculate(&self, start: i32, step: i32) -> i32;

    /// Identity of the implementation.
    fn kind(&self) -> CalculatorKind;
}

macro_rules! calculators {
    ($($(#[$doc:meta])* $ty:ident => $kind:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Default, Clone, Copy)]
            pub struct $ty;

            impl Calculator for $ty {
                fn calculate(&self, start: i32, step: i32) -> i32 {
                    start.wrapping_add(step)
                }

                fn kind(&self) -> CalculatorKind {
                    CalculatorKind::$kind
                }
            }
        )*
    };
}

calculators! {
    /// The target a monomorphic call site resolves to.
    MarvelousCalculator => Marvelous,
    SimpleCalculator => Simple,
    MagnificentCalculator => Magnificent,
    ShinyCalculator => Shiny,
    XCalculator => X,
}

/// Identity of a calculator implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CalculatorKind {
    Simple,
    Marvelous,
    Magnificent,
    Shiny,
    X,
}

impl CalculatorKind {
    /// Every kind.
    pub const ALL: [CalculatorKind; 5] = [
        CalculatorKind::Simple,
        CalculatorKind::Marvelous,
        CalculatorKind::Magnificent,
        CalculatorKind::Shiny,
        CalculatorKind::X,
    ];

    /// Statically dispatched calculation for this kind.
    #[inline]
    pub fn calculate(self, start: i32, step: i32) -> i32 {
        match self {
            CalculatorKind::Simple => start.wrapping_add(step),
            CalculatorKind::Marvelous => start.wrapping_add(step),
            CalculatorKind::Magnificent => start.wrapping_add(step),
            CalculatorKind::Shiny => start.wrapping_add(step),
            CalculatorKind::X => start.wrapping_add(step),
        }
    }

    /// Type name of the implementation.
    pub fn as_str(self) -> &'static str {
        match self {
            CalculatorKind::Simple => "SimpleCalculator",
            CalculatorKind::Marvelous => "MarvelousCalculator",
            CalculatorKind::Magnificent => "MagnificentCalculator",
            CalculatorKind::Shiny => "ShinyCalculator",
            CalculatorKind::X => "XCalculator",
        }
    }
}

impl fmt::Display for CalculatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direct, non-polymorphic calculation used as a baseline.
#[inline]
pub fn baseline_calculation(start: i32, step: i32) -> i32 {
    start.wrapping_add(step)
}

/// The set of calculator instances, built once per scenario context.
pub struct Calculators {
    simple: Box<dyn Calculator>,
    marvelous: Box<dyn Calculator>,
    magnificent: Box<dyn Calculator>,
    shiny: Box<dyn Calculator>,
    x: Box<dyn Calculator>,
}

impl Calculators {
    /// Construct one instance of every calculator.
    pub fn new() -> Self {
        Self {
            simple: Box::new(SimpleCalculator),
            marvelous: Box::new(MarvelousCalculator),
            magnificent: Box::new(MagnificentCalculator),
            shiny: Box::new(ShinyCalculator),
            x: Box::new(XCalculator),
        }
    }

    /// The instance for `kind`.
    #[inline]
    pub fn get(&self, kind: CalculatorKind) -> &dyn Calculator {
        match kind {
            CalculatorKind::Simple => self.simple.as_ref(),
            CalculatorKind::Marvelous => self.marvelous.as_ref(),
            CalculatorKind::Magnificent => self.magnificent.as_ref(),
            CalculatorKind::Shiny => self.shiny.as_ref(),
            CalculatorKind::X => self.x.as_ref(),
        }
    }
}

impl Default for Calculators {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Calculators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(CalculatorKind::ALL.iter().map(|k| self.get(*k).kind()))
            .finish()
    }
}

/// How the selected calculator is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Call through a trait object.
    #[default]
    Virtual,
    /// Match on the calculator kind.
    Enum,
    /// Skip the target and call [`baseline_calculation`].
    Baseline,
}

impl DispatchMode {
    /// Every mode.
    pub const ALL: [DispatchMode; 3] = [DispatchMode::Virtual, DispatchMode::Enum, DispatchMode::Baseline];

    pub fn as_str(self) -> &'static str {
        match self {
            DispatchMode::Virtual => "virtual",
            DispatchMode::Enum => "enum",
            DispatchMode::Baseline => "baseline",
        }
    }

    /// Invoke the calculator selected by `kind`.
    #[inline]
    pub fn invoke(self, calculators: &Calculators, kind: CalculatorKind, start: i32, step: i32) -> i32 {
        match self {
            DispatchMode::Virtual => calculators.get(kind).calculate(start, step),
            DispatchMode::Enum => kind.calculate(start, step),
            DispatchMode::Baseline => baseline_calculation(start, step),
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchMode {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DispatchMode::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ScenarioError::UnknownMode(s.to_string()))
    }
}

/// A weighted rule for picking a calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchPolicy {
    /// Always the same target, though a draw is still made.
    Mono,
    /// The dominant target, except for four draws out of `i32::MAX`.
    MonoRare,
    /// Two targets, evenly.
    EvenTwo,
    /// Three targets, one of them twice as likely.
    ///
    /// Not reachable from [`for_phase`](Self::for_phase).
    EvenThree,
    /// Four targets, evenly.
    ///
    /// Not reachable from [`for_phase`](Self::for_phase).
    EvenFour,
    /// Five targets, evenly.
    EvenFive,
}

impl DispatchPolicy {
    /// Every policy.
    pub const ALL: [DispatchPolicy; 6] = [
        DispatchPolicy::Mono,
        DispatchPolicy::MonoRare,
        DispatchPolicy::EvenTwo,
        DispatchPolicy::EvenThree,
        DispatchPolicy::EvenFour,
        DispatchPolicy::EvenFive,
    ];

    /// The policy in force for an n-morphic phase.
    ///
    /// Phase 4 and anything outside `0..=4` fall back to [`Mono`](Self::Mono).
    #[inline]
    pub fn for_phase(phase: i32) -> Self {
        match phase {
            1 => DispatchPolicy::MonoRare,
            2 => DispatchPolicy::EvenTwo,
            3 => DispatchPolicy::EvenFive,
            _ => DispatchPolicy::Mono,
        }
    }

    /// Exclusive upper bound of the draw made by this policy.
    #[inline]
    pub fn draw_bound(self) -> i32 {
        match self {
            DispatchPolicy::Mono => 5,
            DispatchPolicy::MonoRare => i32::MAX,
            DispatchPolicy::EvenTwo => 2,
            DispatchPolicy::EvenThree => 4,
            DispatchPolicy::EvenFour => 4,
            DispatchPolicy::EvenFive => 5,
        }
    }

    /// Map a draw in `[0, draw_bound)` to a target.
    #[inline]
    pub fn target_for(self, draw: i32) -> CalculatorKind {
        use CalculatorKind::*;

        match self {
            DispatchPolicy::Mono => Marvelous,
            DispatchPolicy::MonoRare => match draw {
                0 => Simple,
                1 => Shiny,
                2 => X,
                3 => Magnificent,
                _ => Marvelous,
            },
            DispatchPolicy::EvenTwo => match draw {
                0 => Marvelous,
                _ => Simple,
            },
            DispatchPolicy::EvenThree => match draw {
                0 => Marvelous,
                1 => Simple,
                _ => Shiny,
            },
            DispatchPolicy::EvenFour => match draw {
                0 => Marvelous,
                1 => Simple,
                2 => Magnificent,
                _ => Shiny,
            },
            DispatchPolicy::EvenFive => match draw {
                0 => Shiny,
                1 => Magnificent,
                2 => Simple,
                3 => Marvelous,
                _ => X,
            },
        }
    }

    /// Draw, fold the draw into `sink`, and return the selected target.
    #[inline]
    pub fn select<R: Rng + ?Sized>(self, rng: &mut R, sink: &Sink) -> CalculatorKind {
        let draw = rng.gen_range(0..self.draw_bound());
        sink.add(draw as i64);
        let kind = self.target_for(draw);
        if self == DispatchPolicy::MonoRare && kind != CalculatorKind::Marvelous {
            announce_rare(kind);
        }
        kind
    }

    /// The targets this policy can return.
    pub fn targets(self) -> Vec<CalculatorKind> {
        let mut targets: Vec<_> = (0..self.draw_bound().min(5))
            .map(|draw| self.target_for(draw))
            .collect();
        if self == DispatchPolicy::MonoRare {
            targets.push(CalculatorKind::Marvelous);
        }
        targets.sort();
        targets.dedup();
        targets
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DispatchPolicy::Mono => "mono",
            DispatchPolicy::MonoRare => "mono-rare",
            DispatchPolicy::EvenTwo => "even-two",
            DispatchPolicy::EvenThree => "even-three",
            DispatchPolicy::EvenFour => "even-four",
            DispatchPolicy::EvenFive => "even-five",
        }
    }
}

#[cold]
#[inline(never)]
fn announce_rare(kind: CalculatorKind) {
    info!(target_kind = %kind, "rare {} selected", kind);
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchPolicy {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DispatchPolicy::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ScenarioError::UnknownPolicy(s.to_string()))
    }
}
