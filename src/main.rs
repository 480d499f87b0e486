#[macro_use]
extern crate rocket;

#[launch]
fn rocket() -> _ {
    let rocket = editorial_importer::rocket();
    log::info!("starting editorial importer");
    rocket
}
