use cucumber::given;
use farmgate_engine::{
    db_types::{NewProduct, Satang},
    InventoryManagement,
};

use crate::cucumber::{MarketWorld, MarketplaceSystem};

#[given("a fresh install")]
async fn fresh_database(world: &mut MarketWorld) {
    let system = MarketplaceSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "farm '{word}' lists '{word}' with {int} kg in stock at {int} satang per kg")]
async fn list_product(world: &mut MarketWorld, farm: String, name: String, stock: i64, price: i64) {
    let product = NewProduct::new(farm, name.clone(), Satang::from(price), stock);
    insert_product(world, name, product).await;
}

#[given(expr = "farm '{word}' lists '{word}' with {int} kg in stock at {int} satang per kg and a wholesale minimum of \
                {int} kg")]
async fn list_wholesale_product(
    world: &mut MarketWorld,
    farm: String,
    name: String,
    stock: i64,
    price: i64,
    moq: i64,
) {
    let product = NewProduct::new(farm, name.clone(), Satang::from(price), stock).with_moq(moq);
    insert_product(world, name, product).await;
}

async fn insert_product(world: &mut MarketWorld, name: String, product: NewProduct) {
    let product = world.system().db.insert_product(product).await.expect("Error inserting product");
    world.products.insert(name, product);
}
