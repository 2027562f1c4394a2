use crate::infra::{InMemoryChecklistRepository, InMemoryEvidenceStore};
use crate::server::load_catalog;
use clap::Args;
use safety_checklist::config::AppConfig;
use safety_checklist::error::AppError;
use safety_checklist::workflows::checklist::{
    Answer, AppUser, Attachments, Checklist, ChecklistService, ChecklistTemplate, Evidence,
    ItemId, LifecycleEngine, ReviewDecision, SimulatedClassifier, SubmissionRequest,
    TemplateCatalog, UserRole,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug, Default)]
pub(crate) struct TemplatesArgs {
    /// Only print the latest template for this work type
    #[arg(long)]
    pub(crate) work_type: Option<String>,
    /// Emit JSON instead of a text listing
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Work type to fill in
    #[arg(long, default_value = "Ladder work")]
    pub(crate) work_type: String,
    /// Simulated classifier latency in milliseconds
    #[arg(long, default_value_t = 250)]
    pub(crate) classifier_delay_ms: u64,
}

pub(crate) fn run_templates(args: TemplatesArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let catalog = load_catalog(&config)?;

    let templates: Vec<&ChecklistTemplate> = match &args.work_type {
        Some(work_type) => vec![catalog.get_template(work_type)?],
        None => catalog.list_templates(),
    };

    if args.json {
        match serde_json::to_string_pretty(&templates) {
            Ok(json) => println!("{}", json),
            Err(err) => println!("Template payload unavailable: {}", err),
        }
        return Ok(());
    }

    for template in templates {
        render_template(template);
    }
    Ok(())
}

fn render_template(template: &ChecklistTemplate) {
    println!(
        "{} ({}, v{})",
        template.work_type, template.id, template.version
    );
    for item in &template.items {
        let marker = if item.required { "required" } else { "optional" };
        println!("  - {}: {} [{}]", item.id, item.text, marker);
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        work_type,
        classifier_delay_ms,
    } = args;

    let config = AppConfig::load()?;
    let catalog = load_catalog(&config)?;
    let evidence = InMemoryEvidenceStore::new(config.evidence.public_base_url.clone());
    let engine = LifecycleEngine::new(
        Arc::new(SimulatedClassifier::new(Duration::from_millis(
            classifier_delay_ms,
        ))),
        Arc::new(evidence.clone()),
        config.classifier.timeout,
    );
    let service = demo_service(catalog, engine);

    let worker = AppUser::new("worker-kim", "Kim", UserRole::Worker);
    let colleague = AppUser::new("worker-lee", "Lee", UserRole::Worker);
    let first_supervisor = AppUser::new("supervisor-park", "Park", UserRole::Supervisor);
    let second_supervisor = AppUser::new("supervisor-jung", "Jung", UserRole::Supervisor);
    let manager = AppUser::new("manager-choi", "Choi", UserRole::SafetyManager);

    println!("Safety checklist demo ({work_type})");

    let mut incomplete = match service.open_draft(&worker, &work_type) {
        Ok(draft) => draft,
        Err(err) => {
            println!("  Unable to open draft: {}", err);
            return Ok(());
        }
    };
    let item_ids: Vec<ItemId> = incomplete
        .responses
        .iter()
        .map(|response| response.item_id.clone())
        .collect();
    for item_id in item_ids.iter().skip(1) {
        incomplete.answer(item_id, Answer::Yes);
    }
    match service
        .submit(
            &worker,
            SubmissionRequest {
                draft: incomplete,
                attachments: Attachments::new(),
            },
        )
        .await
    {
        Ok(_) => println!("- Incomplete draft was accepted unexpectedly"),
        Err(err) => println!("- Incomplete draft refused: {}", err),
    }

    let mut draft = match service.open_draft(&worker, &work_type) {
        Ok(draft) => draft,
        Err(err) => {
            println!("  Unable to open draft: {}", err);
            return Ok(());
        }
    };
    let mut attachments = Attachments::new();
    for (index, item_id) in item_ids.iter().enumerate() {
        if index % 2 == 1 {
            draft.answer(item_id, Answer::No);
            if index == 1 {
                attachments.insert(
                    item_id.clone(),
                    Evidence::new("image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]),
                );
            }
        } else {
            draft.answer(item_id, Answer::Yes);
        }
    }

    println!(
        "- {} submits {} with {} photo(s); classifier delay {} ms",
        worker.name,
        draft.id,
        attachments.len(),
        classifier_delay_ms
    );
    let submitted = match service
        .submit(&worker, SubmissionRequest { draft, attachments })
        .await
    {
        Ok(checklist) => checklist,
        Err(err) => {
            println!("  Submission rejected: {}", err);
            return Ok(());
        }
    };
    render_checklist(&submitted);
    match evidence.len() {
        Ok(count) => println!("  Evidence objects stored: {}", count),
        Err(err) => println!("  Evidence store unavailable: {}", err),
    }

    if let Ok(mut calm) = service.open_draft(&colleague, &work_type) {
        for item_id in &item_ids {
            calm.answer(item_id, Answer::Yes);
        }
        let request = SubmissionRequest {
            draft: calm,
            attachments: Attachments::new(),
        };
        match service.submit(&colleague, request).await {
            Ok(checklist) => println!(
                "- {} submits {} with no risk factors",
                colleague.name, checklist.id
            ),
            Err(err) => println!("  Second submission rejected: {}", err),
        }
    }

    match service.visible(&first_supervisor) {
        Ok(queue) => {
            println!("\nReview queue for {}:", first_supervisor.name);
            render_feed(&queue);
        }
        Err(err) => println!("  Review queue unavailable: {}", err),
    }

    println!(
        "\n{} approves and {} rejects {} at the same time",
        first_supervisor.name, second_supervisor.name, submitted.id
    );
    let (approval, rejection) = tokio::join!(
        service.review(&first_supervisor, &submitted.id, ReviewDecision::Approved),
        service.review(&second_supervisor, &submitted.id, ReviewDecision::Rejected),
    );
    for (reviewer, outcome) in [(&first_supervisor, approval), (&second_supervisor, rejection)] {
        match outcome {
            Ok(checklist) => println!("- {} wins: {}", reviewer.name, checklist.status),
            Err(err) => println!("- {} refused: {}", reviewer.name, err),
        }
    }

    match service.visible(&manager) {
        Ok(overview) => {
            println!("\nSafety manager overview for {}:", manager.name);
            render_feed(&overview);
        }
        Err(err) => println!("  Overview unavailable: {}", err),
    }

    Ok(())
}

fn demo_service(
    catalog: TemplateCatalog,
    engine: LifecycleEngine,
) -> ChecklistService<InMemoryChecklistRepository> {
    ChecklistService::new(
        Arc::new(catalog),
        Arc::new(InMemoryChecklistRepository::default()),
        engine,
    )
}

fn render_checklist(checklist: &Checklist) {
    println!(
        "  {} -> {} | overall risk {} | risk factor {}",
        checklist.id,
        checklist.status,
        checklist.overall_risk.label(),
        if checklist.has_risk_factor { "yes" } else { "no" }
    );
    for response in &checklist.responses {
        let label = response
            .classified_risk
            .map(|level| level.label())
            .unwrap_or("-");
        let photo = response
            .evidence_ref
            .as_ref()
            .map(|evidence| evidence.0.as_str())
            .unwrap_or("no photo");
        println!(
            "    - {}: {:?} | classified {} | {}",
            response.item_id, response.answer, label, photo
        );
    }
}

fn render_feed(checklists: &[Checklist]) {
    if checklists.is_empty() {
        println!("  (empty)");
        return;
    }
    for checklist in checklists {
        let marker = if checklist.is_priority() { "!" } else { " " };
        println!(
            "  {} {} | {} | {} | risk {}",
            marker,
            checklist.id,
            checklist.submitter_name,
            checklist.status,
            checklist.overall_risk.label()
        );
    }
}
