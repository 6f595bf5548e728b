use super::LifecycleEvent;

/// Hooks invoked as a node moves through its lifecycle.
///
/// Every method defaults to a no-op so implementors only override what they
/// care about. Observers run on the dispatch thread in the middle of a
/// transition and must not call back into the engine.
pub trait LifecycleObserver {
    fn on_create(&mut self) {}

    fn on_start(&mut self) {}

    fn on_resume(&mut self) {}

    fn on_pause(&mut self) {}

    fn on_stop(&mut self) {}

    fn on_destroy(&mut self) {}

    fn on_event(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::OnCreate => self.on_create(),
            LifecycleEvent::OnStart => self.on_start(),
            LifecycleEvent::OnResume => self.on_resume(),
            LifecycleEvent::OnPause => self.on_pause(),
            LifecycleEvent::OnStop => self.on_stop(),
            LifecycleEvent::OnDestroy => self.on_destroy(),
        }
    }
}
