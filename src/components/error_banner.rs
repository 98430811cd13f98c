use leptos::prelude::*;

use crate::app::ClinicContext;

#[component]
pub fn ErrorBanner() -> impl IntoView {
    let ctx = expect_context::<ClinicContext>();
    let snapshot = ctx.snapshot();

    move || {
        snapshot.with(|s| s.error.clone()).map(|message| {
            view! {
                <div class="error-banner">
                    <span class="status-text status-error">{message}</span>
                    <button
                        class="btn btn-dismiss"
                        on:click=move |_| ctx.act(|clinic| clinic.dismiss_error())
                    >
                        "\u{00d7}"
                    </button>
                </div>
            }
        })
    }
}
