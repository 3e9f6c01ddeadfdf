//! Shared fixtures for database tests.

use super::*;
use crate::models::{Capability, Equipment, Io, Role, TestMethod, User};

/// A seeded database: two capabilities with one method each, a reservable
/// rheometer, an active researcher and an active IO.
pub(crate) struct Fixture {
    pub db: DbPool,
    pub rheology: Capability,
    pub thermal: Capability,
    pub mfr: TestMethod,
    pub dsc: TestMethod,
    pub rheometer: Equipment,
    pub researcher: User,
    pub io: Io,
}

pub(crate) async fn seed() -> Fixture {
    seed_into(create_memory_pool().await.unwrap()).await
}

/// Seeds a file database under `dir` with a multi-connection pool, for
/// tests where writers actually contend for the lock.
pub(crate) async fn seed_file(dir: &std::path::Path, max_connections: u32) -> Fixture {
    let url = format!("sqlite://{}?mode=rwc", dir.join("portal.db").display());
    let db = create_pool_with_options(
        &url,
        PoolOptions {
            max_connections,
            min_connections: 1,
            ..PoolOptions::default()
        },
    )
    .await
    .unwrap();
    run_migrations(&db).await.unwrap();
    seed_into(db).await
}

async fn seed_into(db: DbPool) -> Fixture {

    let rheology = Capability::new("Rheology", "RHE");
    let thermal = Capability::new("Thermal Analysis", "TA");
    let capabilities = create_capability_repository(&db);
    capabilities.create(&rheology).await.unwrap();
    capabilities.create(&thermal).await.unwrap();

    let mfr = TestMethod::new("RHE-MFR", "Melt flow rate", rheology.id);
    let dsc = TestMethod::new("TA-DSC", "DSC melting point", thermal.id);
    let methods = create_test_method_repository(&db);
    methods.create(&mfr).await.unwrap();
    methods.create(&dsc).await.unwrap();

    let mut rheometer = Equipment::new("EQ-RHE-01", "Rotational rheometer", rheology.id);
    rheometer.reservable = true;
    create_equipment_repository(&db)
        .create(&rheometer)
        .await
        .unwrap();

    let researcher = User::new("ana@lab.example", "Ana", Role::Researcher);
    create_user_repository(&db).create(&researcher).await.unwrap();

    let io = Io::new("IO-4711", "Compounding trials");
    create_io_repository(&db).create(&io).await.unwrap();

    Fixture {
        db,
        rheology,
        thermal,
        mfr,
        dsc,
        rheometer,
        researcher,
        io,
    }
}
