use crate::ir::Ir;

/// Hook invoked on static-call sites to surface callees hidden in
/// frontend-specific nodes (e.g. implicit class initialization).
///
/// Mirrors `rta_set_detection_callbacks`/`detect_call` from the original
/// implementation; the default hook returns `None` for every call.
pub type DetectCallHook<I> = Box<dyn Fn(&I, <I as Ir>::Method) -> Option<<I as Ir>::Method>>;

/// Configuration threaded through both the analyzer and the devirtualizer.
///
/// Replaces the original's mutable global `detect_call` function pointer and
/// its `#define JUST_CHA` compile-time switch with explicit fields, per the
/// design notes: both become ordinary runtime state owned by the caller.
pub struct AnalysisConfig<I: Ir> {
    detect_call: DetectCallHook<I>,
    /// When set, every class encountered by the resolver is treated as live
    /// regardless of whether a `VptrIsSet` for it has actually been seen
    /// (the CHA-only fallback used during early bring-up of a new frontend).
    pub just_cha: bool,
    /// When set, the analyzer and devirtualizer accumulate `RtaStats` and
    /// log them at `info` level once the devirtualization pass completes.
    pub collect_stats: bool,
}

impl<I: Ir> AnalysisConfig<I> {
    pub fn new() -> Self {
        Self {
            detect_call: Box::new(|_, _| None),
            just_cha: false,
            collect_stats: false,
        }
    }

    pub fn with_detect_call(mut self, hook: DetectCallHook<I>) -> Self {
        self.detect_call = hook;
        self
    }

    pub fn with_just_cha(mut self, just_cha: bool) -> Self {
        self.just_cha = just_cha;
        self
    }

    pub fn with_stats(mut self, collect_stats: bool) -> Self {
        self.collect_stats = collect_stats;
        self
    }

    pub(crate) fn detect_call(&self, ir: &I, call_site: I::Method) -> Option<I::Method> {
        (self.detect_call)(ir, call_site)
    }
}

impl<I: Ir> Default for AnalysisConfig<I> {
    fn default() -> Self {
        Self::new()
    }
}
