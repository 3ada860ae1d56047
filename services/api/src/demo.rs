use crate::infra::{build_marketplace, PhotoStore, ServiceMarketplace};
use autolist::config::DEFAULT_MAX_UPLOAD_BYTES;
use autolist::error::AppError;
use autolist::marketplace::{
    FinancingSubmission, InMemoryBlobStore, ListingDraft, ListingStatus, ListingWithOwner,
    ModerationDecision, PhotoUpload, ProfileUpdate, UserId,
};
use clap::Args;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reject the sample listing instead of approving it.
    #[arg(long)]
    pub(crate) reject: bool,
    /// Attach a placeholder photo to the sample listing.
    #[arg(long)]
    pub(crate) with_photo: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let marketplace = build_marketplace(
        PhotoStore::Memory(InMemoryBlobStore::new("http://127.0.0.1:3000/storage")),
        DEFAULT_MAX_UPLOAD_BYTES,
    );
    let seller = UserId("seller-demo".to_string());
    let buyer = UserId("buyer-demo".to_string());

    println!("Vehicle marketplace demo");

    marketplace
        .profiles
        .update_contact(
            &seller,
            ProfileUpdate {
                username: Some("autos_del_norte".to_string()),
                phone_number: Some("+52 81 5555 0101".to_string()),
                address: Some("Av. Constitucion 100, Monterrey".to_string()),
                company_name: Some("Autos del Norte".to_string()),
                bio: None,
            },
        )?;

    let photos = if args.with_photo {
        vec![PhotoUpload::new("front.jpg", b"placeholder".to_vec())]
    } else {
        Vec::new()
    };
    let listing = marketplace
        .submissions
        .submit(
            &seller,
            ListingDraft {
                make: "Toyota".to_string(),
                model: "Corolla".to_string(),
                year: 2022,
                mileage: 15000,
                description: "clean title".to_string(),
            },
            photos,
        )?;
    println!(
        "\nSubmitted {} {} {} ({} photos) -> {}",
        listing.year,
        listing.make,
        listing.model,
        listing.photos.len(),
        listing.status
    );

    let queue = marketplace
        .moderation
        .list_by_status(ListingStatus::Pending)?;
    render_rows("Moderation queue (pending)", &queue);

    let decision = if args.reject {
        ModerationDecision::Reject
    } else {
        ModerationDecision::Approve
    };
    let decided = marketplace
        .moderation
        .transition(&listing.id, decision)?;
    println!("\nModerated listing {} -> {}", decided.id, decided.status);

    let catalog = marketplace.catalog.approved()?;
    render_rows("Public catalog", &catalog);

    if decided.status == ListingStatus::Approved {
        apply_for_financing(&marketplace, &buyer, &decided.id)?;
    } else {
        println!("\nFinancing skipped: listing is not public");
    }

    Ok(())
}

fn apply_for_financing(
    marketplace: &ServiceMarketplace,
    buyer: &UserId,
    listing_id: &autolist::marketplace::ListingId,
) -> Result<(), AppError> {
    let application = marketplace
        .financing
        .apply(
            buyer,
            listing_id,
            FinancingSubmission {
                monthly_income: 32000.0,
                employer: "Cerveceria Cuauhtemoc".to_string(),
                months_employed: 48,
            },
        )?;
    println!(
        "\nFinancing application {} recorded for {} (income {:.2}, {} months at {})",
        application.id.0,
        application.applicant,
        application.monthly_income,
        application.months_employed,
        application.employer
    );
    Ok(())
}

fn render_rows(title: &str, rows: &[ListingWithOwner]) {
    if rows.is_empty() {
        println!("\n{title}: none");
        return;
    }

    println!("\n{title}");
    for row in rows {
        let contact = row
            .owner_contact
            .as_ref()
            .map(|contact| {
                let phone = contact.phone_number.as_deref().unwrap_or("no phone");
                format!("{} ({phone})", contact.username)
            })
            .unwrap_or_else(|| "unknown seller".to_string());
        println!(
            "- {} {} {} | {} km | {} | {}",
            row.listing.year,
            row.listing.make,
            row.listing.model,
            row.listing.mileage,
            row.listing.status,
            contact
        );
    }
}
