use std::collections::BTreeMap;
use std::error::Error;

use dotenv::dotenv;
use log::{info, initialize_logger};
use structopt::StructOpt;

use petransport::config::get_variable;
use petransport::db::PgDb;
use petransport::document::DocumentType;
use petransport::errors::BackendError;
use petransport::ids::EntityId;
use petransport::requirements::set_required_documents;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "set-required-documents",
    about = "Replace the checklist of required documents of a trip"
)]
struct Opt {
    /// The trip to configure
    #[structopt(parse(try_from_str = EntityId::parse))]
    trip: EntityId,

    /// A document the tutor must supply (repeatable)
    #[structopt(long = "human")]
    human_docs: Vec<DocumentType>,

    /// Documents a pet must supply, as PET_ID=TYPE[,TYPE...] (repeatable)
    #[structopt(long = "pet", parse(try_from_str = parse_pet_docs))]
    pet_docs: Vec<(EntityId, Vec<DocumentType>)>,
}

fn parse_pet_docs(raw: &str) -> Result<(EntityId, Vec<DocumentType>), BackendError> {
    let (pet, docs) = match raw.find('=') {
        Some(i) => (&raw[..i], &raw[i + 1..]),
        None => (raw, ""),
    };

    let docs = docs
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(DocumentType::from)
        .collect();

    Ok((EntityId::parse(pet)?, docs))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = initialize_logger();

    let connection_string = get_variable("PETRANSPORT_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string).await?;
    let db = PgDb::new(pool);

    let mut pet_docs: BTreeMap<EntityId, Vec<DocumentType>> = BTreeMap::new();
    for (pet, docs) in opt.pet_docs {
        pet_docs.entry(pet).or_default().extend(docs);
    }

    let logger = logger.new(log::o!("trip" => opt.trip.to_string()));
    info!(logger, "Setting required documents..."; "human" => opt.human_docs.len(), "pets" => pet_docs.len());

    let required = set_required_documents(&db, &logger, opt.trip, opt.human_docs, pet_docs).await?;

    println!("{}", serde_json::to_string_pretty(&required)?);

    Ok(())
}
