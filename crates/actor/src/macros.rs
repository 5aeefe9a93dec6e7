/// Defines a new actor type.
///
/// Use this macro to define both an actor's state type and its wrapper
/// type in one go. Attributes (doc comments included) apply to the wrapper
/// type, which is what callers interact with; the state type is named in
/// parentheses, optionally with its own visibility.
///
/// ```ignore
/// define_actor! {
///     /// A counter.
///     pub struct Counter(CounterState) {
///         value: u32,
///     }
/// }
/// ```
///
/// The wrapper type gets private `spawn` and `handle` methods, and can
/// later have `impl` blocks to add some convenient methods to interact
/// with the actor.
#[macro_export]
macro_rules! define_actor {
    {
        $(#[$wrapper_attr:meta])*
        $v:vis struct $wrapper_type:ident($state_v:vis $state_type:ident) {
            $($state_items:tt)*
        }
    } => {
        $state_v struct $state_type {
            $($state_items)*
        }

        $(#[$wrapper_attr])*
        #[derive(Clone)]
        $v struct $wrapper_type {
            handle: $crate::Actor<$state_type>,
        }

        impl $wrapper_type {
            #[inline]
            fn spawn(
                state: $state_type,
                label: Option<&str>,
            ) -> $wrapper_type {
                $wrapper_type {
                    handle: $crate::Actor::spawn(state, label),
                }
            }

            #[inline]
            fn handle(&self) -> &$crate::Actor<$state_type> {
                &self.handle
            }
        }
    };
}
