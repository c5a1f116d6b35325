fn main() {
    // ESP-IDF environment is only needed for `*-espidf` targets (Xtensa and
    // RISC-V chips alike). Host builds and tests skip it.
    if let Ok(target) = std::env::var("TARGET") {
        if target.ends_with("-espidf") {
            embuild::espidf::sysenv::output();
        }
    }
}
