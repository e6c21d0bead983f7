//! Walk one task through the portal: file, accept, complete, query,
//! resubmit, approve. Run with `cargo run --example portal`.

use std::sync::Arc;

use task_portal::{
    PortalService,
    task::{Applicant, DocumentRef, NewTask},
    types::{Money, TimeSpan},
    user::{NewUser, Role},
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let db = sled::Config::new().temporary(true).open()?;
    let portal = PortalService::new(Arc::new(db))?;

    let admin = portal
        .register_user(NewUser::new("amina", Role::Admin).set_full_name("Amina Bello"))?
        .actor();
    let staff = portal
        .register_user(NewUser::new("tunde", Role::Staff).set_full_name("Tunde Ade"))?
        .actor();

    let visa = portal.create_service(&admin, "Visa Application", "Tourist visa filing", "100.00".parse()?)?;

    let task = portal.create_task(
        &admin,
        NewTask::new("Visa for Chidi Okafor", &visa.id, &staff.id, TimeSpan::hours(48))
            .set_applicant(
                Applicant::new("Chidi Okafor", "08031234567", "12 Marina, Lagos")
                    .set_email("chidi@example.com"),
            )
            .set_application_form(DocumentRef::new("forms/chidi-visa.pdf")?),
    )?;

    portal.accept(&staff, &task.id)?;
    portal.update_document(&staff, &task.id, DocumentRef::new("processed/chidi-visa.pdf")?)?;
    portal.complete(&staff, &task.id)?;
    portal.query(&admin, &task.id, "passport photo is missing")?;
    portal.update_document(&staff, &task.id, DocumentRef::new("processed/chidi-visa-v2.pdf")?)?;
    portal.complete(&staff, &task.id)?;
    let task = portal.approve(&admin, &task.id)?;

    println!("task {} is {}", task.id, task.status);
    println!("wallet: {}", portal.wallet_balance(&staff.id)?);
    for entry in portal.transactions(&staff)? {
        println!("  {} {} {}", entry.kind.as_str(), entry.amount, entry.description);
    }
    for note in portal.notifications(&staff)? {
        println!("  [{}] {}", if note.is_read { " " } else { "*" }, note.message);
    }

    let audit = portal.verify_ledger(&staff.id)?;
    assert!(audit.is_consistent());
    assert_eq!(portal.wallet_balance(&staff.id)?, Money::from_cents(7_000));
    Ok(())
}
