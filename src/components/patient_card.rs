use leptos::prelude::*;

use crate::models::PatientRecord;

#[component]
pub fn PatientCard(
    record: PatientRecord,
    #[prop(into)] on_view: Callback<i64>,
    #[prop(into)] on_edit: Callback<i64>,
    #[prop(into)] on_delete: Callback<i64>,
    #[prop(default = false)] deleting: bool,
) -> impl IntoView {
    let id = record.id;
    let band = record.risk_band();

    let factors = record
        .details
        .present_factors()
        .into_iter()
        .map(|f| f.label())
        .collect::<Vec<_>>();
    let factor_text = if factors.is_empty() {
        "None reported".to_string()
    } else {
        factors.join(", ")
    };

    let added = record
        .added_on()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "--".to_string());

    view! {
        <div class="patient-card">
            <div class="patient-card-header">
                <div class="patient-card-title">
                    <h3>{record.details.name.clone()}</h3>
                    <span class="patient-meta">
                        {format!("{} years, {}", record.details.age, record.details.sex_label())}
                    </span>
                </div>
                <span class=band.css_class()>{band.label()}</span>
            </div>
            <div class="patient-card-body">
                <div class="detail-row">
                    <span class="detail-label">"Confidence"</span>
                    <span class="detail-value">{record.confidence_percent()}</span>
                </div>
                <div class="detail-row">
                    <span class="detail-label">"Risk factors"</span>
                    <span class="detail-value">{factor_text}</span>
                </div>
                <div class="detail-row">
                    <span class="detail-label">"Added"</span>
                    <span class="detail-value">{added}</span>
                </div>
            </div>
            <div class="patient-card-actions">
                <button class="btn btn-secondary" on:click=move |_| on_view.run(id)>"View"</button>
                <button class="btn btn-secondary" on:click=move |_| on_edit.run(id) disabled=deleting>
                    "Edit"
                </button>
                <button class="btn btn-delete" on:click=move |_| on_delete.run(id) disabled=deleting>
                    {if deleting { "Deleting..." } else { "Delete" }}
                </button>
            </div>
        </div>
    }
}
