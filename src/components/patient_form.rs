use leptos::prelude::*;

use crate::app::ClinicContext;
use crate::models::{PatientDraft, RiskFactor, MAX_AGE};
use crate::view::ViewMode;

/// Create/edit form. Input is held locally until submit; the in-flight
/// flag and any error come from the clinic snapshot.
#[component]
pub fn PatientForm(initial: PatientDraft) -> impl IntoView {
    let ctx = expect_context::<ClinicContext>();
    let snapshot = ctx.snapshot();
    let draft = RwSignal::new(initial);

    let submitting = move || snapshot.with(|s| s.form.as_ref().is_some_and(|f| f.submitting));
    let form_error = move || snapshot.with(|s| s.form.as_ref().and_then(|f| f.error.clone()));
    let title = move || match snapshot.with(|s| s.mode.clone()) {
        ViewMode::Edit(record) => format!("Edit Patient: {}", record.details.name),
        _ => "Add New Patient".to_string(),
    };

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let submitted = draft.get_untracked();
        ctx.run(move |clinic| async move { clinic.submit(submitted).await });
    };

    let on_cancel = move |_| {
        let _ = ctx.act(|clinic| clinic.cancel_form());
    };

    view! {
        <form class="patient-form" on:submit=on_submit>
            <h2>{title}</h2>

            <div class="form-group">
                <label for="patient-name">"Name"</label>
                <input
                    id="patient-name"
                    type="text"
                    class="input"
                    prop:value=move || draft.with(|d| d.name.clone())
                    on:input=move |ev| draft.update(|d| d.name = event_target_value(&ev))
                    disabled=submitting
                />
            </div>

            <div class="form-group">
                <label for="patient-age">"Age"</label>
                <input
                    id="patient-age"
                    type="number"
                    min="0"
                    max=MAX_AGE.to_string()
                    class="input"
                    prop:value=move || draft.with(|d| d.age.to_string())
                    on:input=move |ev| {
                        if let Ok(age) = event_target_value(&ev).trim().parse::<u32>() {
                            draft.update(|d| d.age = age);
                        }
                    }
                    disabled=submitting
                />
            </div>

            <div class="form-group">
                <label for="patient-sex">"Biological sex"</label>
                <select
                    id="patient-sex"
                    class="input"
                    on:change=move |ev| draft.update(|d| d.biological_gender = event_target_value(&ev) == "male")
                    disabled=submitting
                >
                    <option value="female" selected=move || draft.with(|d| !d.biological_gender)>"Female"</option>
                    <option value="male" selected=move || draft.with(|d| d.biological_gender)>"Male"</option>
                </select>
            </div>

            <fieldset class="form-group risk-factors">
                <legend>"Risk factors"</legend>
                {RiskFactor::ALL
                    .into_iter()
                    .map(|factor| {
                        view! {
                            <label class="checkbox-row">
                                <input
                                    type="checkbox"
                                    prop:checked=move || draft.with(|d| d.factor(factor))
                                    on:change=move |ev| {
                                        let present = event_target_checked(&ev);
                                        draft.update(|d| d.set_factor(factor, present));
                                    }
                                    disabled=submitting
                                />
                                {factor.label()}
                            </label>
                        }
                    })
                    .collect_view()}
            </fieldset>

            {move || form_error().map(|e| view! { <span class="status-text status-error">{e}</span> })}

            <div class="form-actions">
                <button type="submit" class="btn btn-primary" disabled=submitting>
                    {move || if submitting() { "Saving..." } else { "Save" }}
                </button>
                <button type="button" class="btn btn-secondary" on:click=on_cancel disabled=submitting>
                    "Cancel"
                </button>
            </div>
        </form>
    }
}
