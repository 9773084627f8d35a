use std::any::Any;
use std::fmt;

/// Which listener registry a diagnostic refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RegistryKind {
    Tick,
    Pause,
    Resume,
}

impl RegistryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tick => "tick",
            Self::Pause => "pause",
            Self::Resume => "resume",
        }
    }
}

/// Non-fatal conditions the scheduler contains locally.
///
/// Every diagnostic is logged; a sink installed with
/// `FrameScheduler::set_diagnostic_sink` receives it as well.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// `set_rate` stored a different value than requested.
    RateClamped { requested: f64, applied: f64 },

    /// A registration call received no listener and was ignored.
    RejectedListener { registry: RegistryKind },

    /// A listener panicked; the rest of the dispatch still ran.
    ListenerPanicked { registry: RegistryKind, message: String },

    /// The loop declined to re-arm because the target rate is not positive.
    LoopHalted { target_fps: f64 },
}

impl Diagnostic {
    pub(crate) fn log(&self) {
        match self {
            Self::RateClamped { .. } | Self::LoopHalted { .. } => log::debug!("{self}"),
            Self::RejectedListener { .. } => log::warn!("{self}"),
            Self::ListenerPanicked { .. } => log::error!("{self}"),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateClamped { requested, applied } => {
                write!(f, "frame rate {requested} clamped to {applied}")
            }
            Self::RejectedListener { registry } => {
                write!(f, "ignored empty {} listener registration", registry.as_str())
            }
            Self::ListenerPanicked { registry, message } => {
                write!(f, "{} listener panicked: {message}", registry.as_str())
            }
            Self::LoopHalted { target_fps } => {
                write!(f, "frame loop halted at non-positive rate {target_fps}")
            }
        }
    }
}

/// Extracts a readable message from a `catch_unwind` payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_from_str_and_string() {
        let a: Box<dyn Any + Send> = Box::new("boom");
        let b: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let c: Box<dyn Any + Send> = Box::new(7_u32);

        assert_eq!(panic_message(a.as_ref()), "boom");
        assert_eq!(panic_message(b.as_ref()), "bang");
        assert_eq!(panic_message(c.as_ref()), "non-string panic payload");
    }

    #[test]
    fn display_names_registry() {
        let d = Diagnostic::ListenerPanicked {
            registry: RegistryKind::Resume,
            message: "oops".into(),
        };
        assert_eq!(d.to_string(), "resume listener panicked: oops");
    }
}
