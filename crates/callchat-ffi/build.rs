fn main() {
    uniffi::generate_scaffolding("src/callchat.udl").unwrap();
}
