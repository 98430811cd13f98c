use std::future::Future;
use std::rc::Rc;

use leptos::ev;
use leptos::prelude::*;
use tracing::error;
use wasm_bindgen_futures::spawn_local;

use crate::clinic::{BrowserClinic, Clinic, ClinicSnapshot};
use crate::components::error_banner::ErrorBanner;
use crate::components::sidebar::Sidebar;
use crate::config::ClientConfig;
use crate::pages::dashboard::DashboardPage;
use crate::pages::login::LoginPage;

/// Handle shared by every component through Leptos context.
///
/// The clinic itself is single-threaded and lives in local storage; the UI
/// reads a [`ClinicSnapshot`] signal that is republished after each
/// operation.
#[derive(Clone, Copy)]
pub struct ClinicContext {
    clinic: StoredValue<Rc<BrowserClinic>, LocalStorage>,
    snapshot: ReadSignal<ClinicSnapshot>,
    set_snapshot: WriteSignal<ClinicSnapshot>,
}

impl ClinicContext {
    fn new(clinic: BrowserClinic) -> Self {
        let (snapshot, set_snapshot) = signal(clinic.snapshot());
        Self {
            clinic: StoredValue::new_local(Rc::new(clinic)),
            snapshot,
            set_snapshot,
        }
    }

    pub fn snapshot(&self) -> ReadSignal<ClinicSnapshot> {
        self.snapshot
    }

    pub fn refresh(&self) {
        self.set_snapshot.set(self.clinic.with_value(|c| c.snapshot()));
    }

    /// Run a synchronous operation and republish.
    pub fn act<T>(&self, op: impl FnOnce(&BrowserClinic) -> T) -> T {
        let clinic = self.clinic.get_value();
        let out = op(&clinic);
        self.set_snapshot.set(clinic.snapshot());
        out
    }

    /// Spawn an async operation. The snapshot is republished once the
    /// operation first yields (so in-flight flags render) and again when it
    /// completes.
    pub fn run<F, Fut>(&self, op: F)
    where
        F: FnOnce(Rc<BrowserClinic>) -> Fut + 'static,
        Fut: Future + 'static,
    {
        let clinic = self.clinic.get_value();
        let publish = self.set_snapshot;
        spawn_local(async move {
            let mut task = Box::pin(op(Rc::clone(&clinic)));
            if futures::poll!(task.as_mut()).is_pending() {
                publish.set(clinic.snapshot());
                task.await;
            }
            publish.set(clinic.snapshot());
        });
    }
}

#[component]
pub fn App(config: ClientConfig) -> impl IntoView {
    let clinic = match Clinic::for_browser(&config) {
        Ok(clinic) => clinic,
        Err(e) => {
            error!("Failed to start client: {}", e);
            return view! {
                <div class="page fatal-error">
                    <h2>"MECHA-LUNG"</h2>
                    <span class="status-text status-error">{e.to_string()}</span>
                </div>
            }
            .into_any();
        }
    };

    let ctx = ClinicContext::new(clinic);
    provide_context(ctx);

    ctx.run(|clinic| async move { clinic.start().await });

    // Another tab may sign out by removing the token.
    let listener = window_event_listener(ev::storage, move |_| ctx.refresh());
    on_cleanup(move || listener.remove());

    let snapshot = ctx.snapshot();
    view! {
        <div class="app-layout">
            <Sidebar />
            <main class="content">
                <ErrorBanner />
                <Show
                    when=move || snapshot.with(|s| s.principal.is_some())
                    fallback=|| view! { <LoginPage /> }
                >
                    <DashboardPage />
                </Show>
            </main>
        </div>
    }
    .into_any()
}
