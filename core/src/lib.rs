//! # Shuttle Core
//!
//! Core types shared by every layer of the shuttle boarding system.
//!
//! ## Core Concepts
//!
//! - **Route**: immutable reference data (`ShuttleRoute` with departure/destination)
//! - **Rider**: the account a QR credential resolves to
//! - **Boarding Record**: one row per (rider, route, service day)
//! - **Service Calendar**: the calendar-day window used by the duplicate-boarding policy
//! - **Route Message**: what travels over a route's live channel
//! - **Environment**: injected dependencies (`Clock`) so time is testable
//! - **Reducer / Effect**: multi-step flows as `(State, Action) → (State, Effects)`,
//!   with I/O described as effects and driven by [`runtime::run`]
//!
//! ## Example
//!
//! ```
//! use shuttle_core::calendar::ServiceCalendar;
//! use chrono::{TimeZone, Utc};
//!
//! let calendar = ServiceCalendar::new(chrono_tz::Asia::Seoul);
//! let at = Utc.with_ymd_and_hms(2025, 3, 10, 14, 59, 59).unwrap();
//! // 23:59:59 in Seoul, still the 10th
//! assert_eq!(calendar.service_day(at).to_string(), "2025-03-10");
//! ```

#![forbid(unsafe_code)]

pub mod calendar;
pub mod live;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use serde::{Deserialize, Serialize};

pub use calendar::{DayWindow, ServiceCalendar};
pub use live::{PositionUpdate, RouteEnd, RouteMessage, RouteTopic, WireMessage};
pub use types::{
    BoardingId, BoardingRecord, Location, LocationId, NewBoarding, Rider, RouteId, ShuttleRoute,
    UserId,
};

/// Environment module - Dependency injection traits
///
/// All access to "now" goes through [`Clock`](environment::Clock) so that
/// day-boundary behaviour can be tested at exact instants.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use shuttle_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

/// Reducer module - Core business logic abstraction
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// All I/O a step needs is returned as an [`Effect`](super::effect::Effect)
/// whose result comes back as the next action.
pub mod reducer {
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// # Returns
        ///
        /// Effects to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Vec<Effect<Self::Action>>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values, not execution.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    impl<Action> Effect<Action> {
        /// Wrap an async computation that always yields a follow-up action.
        #[must_use]
        pub fn future<F>(fut: F) -> Self
        where
            F: Future<Output = Action> + Send + 'static,
        {
            Self::Future(Box::pin(async move { Some(fut.await) }))
        }
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }
}

/// Runtime module - Effect execution
///
/// A minimal in-task runtime: effects run one after another and every action
/// they yield is reduced before the next effect starts. The state is owned
/// by the caller for the duration of one flow, so no locking is needed.
pub mod runtime {
    use super::effect::Effect;
    use super::reducer::Reducer;
    use std::collections::VecDeque;

    /// Reduce `action` and every action its effects feed back, until no
    /// effects remain.
    ///
    /// # Example
    ///
    /// ```
    /// use shuttle_core::effect::Effect;
    /// use shuttle_core::reducer::Reducer;
    /// use shuttle_core::runtime;
    ///
    /// struct Countdown;
    ///
    /// impl Reducer for Countdown {
    ///     type State = Vec<u32>;
    ///     type Action = u32;
    ///     type Environment = ();
    ///
    ///     fn reduce(&self, seen: &mut Vec<u32>, n: u32, _env: &()) -> Vec<Effect<u32>> {
    ///         seen.push(n);
    ///         if n == 0 {
    ///             return vec![Effect::None];
    ///         }
    ///         vec![Effect::future(async move { n - 1 })]
    ///     }
    /// }
    ///
    /// # tokio_test::block_on(async {
    /// let mut seen = Vec::new();
    /// runtime::run(&Countdown, &mut seen, 3, &()).await;
    /// assert_eq!(seen, vec![3, 2, 1, 0]);
    /// # });
    /// ```
    pub async fn run<R: Reducer>(
        reducer: &R,
        state: &mut R::State,
        action: R::Action,
        env: &R::Environment,
    ) {
        let mut pending = VecDeque::from([action]);
        while let Some(action) = pending.pop_front() {
            for effect in reducer.reduce(state, action, env) {
                match effect {
                    Effect::None => {}
                    Effect::Future(fut) => {
                        if let Some(next) = fut.await {
                            pending.push_back(next);
                        }
                    }
                }
            }
        }
    }

}
