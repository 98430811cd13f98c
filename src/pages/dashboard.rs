use leptos::prelude::*;

use crate::app::ClinicContext;
use crate::components::patient_card::PatientCard;
use crate::components::patient_form::PatientForm;
use crate::view::ViewMode;

/// Which form, if any, is open. `Some(None)` is create, `Some(Some(id))` edit.
type FormKey = Option<Option<i64>>;

#[component]
pub fn DashboardPage() -> impl IntoView {
    let ctx = expect_context::<ClinicContext>();
    let snapshot = ctx.snapshot();

    // Only a change of form re-mounts it; other snapshot updates must not
    // wipe the user's input.
    let form_key = Memo::new(move |_| {
        snapshot.with(|s| -> FormKey {
            match &s.mode {
                ViewMode::List => None,
                ViewMode::Create => Some(None),
                ViewMode::Edit(record) => Some(Some(record.id)),
            }
        })
    });

    let add_patient = move |_| {
        let _ = ctx.act(|clinic| clinic.begin_create());
    };
    let reload = move |_| {
        ctx.run(|clinic| async move { clinic.load_roster().await });
    };

    let on_view = Callback::new(move |id: i64| {
        ctx.run(move |clinic| async move { clinic.view_patient(id).await });
    });
    let on_edit = Callback::new(move |id: i64| {
        let _ = ctx.act(|clinic| clinic.begin_edit(id));
    });
    let on_delete = Callback::new(move |id: i64| {
        ctx.run(move |clinic| async move { clinic.delete(id).await });
    });

    let patient_list = move || {
        let (records, deleting, loading) = snapshot.with(|s| {
            (s.roster.clone(), s.deleting.clone(), s.roster_loading)
        });

        if records.is_empty() {
            let message = if loading { "Loading patients..." } else { "No patients yet." };
            return view! { <p class="empty-state">{message}</p> }.into_any();
        }

        records
            .into_iter()
            .map(|record| {
                let busy = deleting.contains(&record.id);
                view! {
                    <PatientCard
                        record=record
                        on_view=on_view
                        on_edit=on_edit
                        on_delete=on_delete
                        deleting=busy
                    />
                }
            })
            .collect_view()
            .into_any()
    };

    view! {
        <div class="page dashboard-page">
            {move || match form_key.get() {
                None => view! {
                    <div class="dashboard-header">
                        <h2>{move || format!("Patients ({})", snapshot.with(|s| s.roster.len()))}</h2>
                        <div class="dashboard-actions">
                            <button
                                class="btn btn-secondary"
                                on:click=reload
                                disabled=move || snapshot.with(|s| s.roster_loading)
                            >
                                "Refresh"
                            </button>
                            <button class="btn btn-primary" on:click=add_patient>
                                "Add Patient"
                            </button>
                        </div>
                    </div>
                    <div class="patient-list">{patient_list}</div>
                }
                .into_any(),
                Some(_) => {
                    let initial = snapshot
                        .with_untracked(|s| s.form.as_ref().map(|f| f.draft.clone()))
                        .unwrap_or_default();
                    view! { <PatientForm initial=initial /> }.into_any()
                }
            }}
        </div>
    }
}
