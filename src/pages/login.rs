use leptos::prelude::*;

use crate::app::ClinicContext;

#[component]
pub fn LoginPage() -> impl IntoView {
    let ctx = expect_context::<ClinicContext>();
    let snapshot = ctx.snapshot();

    let (user_name, set_user_name) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let signing_in = move || snapshot.with(|s| s.signing_in);

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let user = user_name.get_untracked();
        let pass = password.get_untracked();
        ctx.run(move |clinic| async move {
            if clinic.login(&user, &pass).await.is_err() {
                set_password.set(String::new());
            }
        });
    };

    view! {
        <div class="page login-page">
            <h2>"Doctor Login"</h2>
            <p class="page-description">
                "Sign in to view and manage patient risk assessments."
            </p>
            <form class="login-form" on:submit=on_submit>
                <div class="form-group">
                    <label for="login-user">"Username"</label>
                    <input
                        id="login-user"
                        type="text"
                        class="input"
                        autocomplete="username"
                        prop:value=move || user_name.get()
                        on:input=move |ev| set_user_name.set(event_target_value(&ev))
                        disabled=signing_in
                    />
                </div>
                <div class="form-group">
                    <label for="login-password">"Password"</label>
                    <input
                        id="login-password"
                        type="password"
                        class="input input-password"
                        autocomplete="current-password"
                        prop:value=move || password.get()
                        on:input=move |ev| set_password.set(event_target_value(&ev))
                        disabled=signing_in
                    />
                </div>
                <button type="submit" class="btn btn-primary" disabled=signing_in>
                    {move || if signing_in() { "Logging in..." } else { "Login" }}
                </button>
            </form>
        </div>
    }
}
