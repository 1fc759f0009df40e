use sci_domain::builder::{KEY_APPEND_TEXT, KEY_CODE_TYPE, KEY_COMPUTER, KEY_DESCRIPTION, KEY_FOLDER,
                          KEY_INPUT_HANDLER, KEY_LABEL, KEY_PREPEND_TEXT, KEY_REL_PATH, KEY_REMOTE_ABS_PATH};
use sci_domain::{BuildError, CodeBuilder, CodeRepository, CodeSourceKind, Computer, GroupRepository, SpecValue};
use std::path::PathBuf;

fn main() {
    // Cargar .env si existe para obtener DATABASE_URL
    let _ = dotenvy::dotenv();
    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 3 && args[1] == "group" && args[2] == "list" {
        let mut all_users = false;
        let mut user: Option<String> = None;
        let mut with_description = false;
        let mut i = 3;
        while i < args.len() {
            match args[i].as_str() {
                "--all-users" | "-A" => { all_users = true; }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() { user = Some(args[i].clone()); }
                }
                "--with-description" | "-d" => { with_description = true; }
                _ => {}
            }
            i += 1;
        }
        // --all-users y --user son mutuamente excluyentes
        if all_users && user.is_some() {
            eprintln!("Uso: sci-cli group list [--all-users|-A] [--user <EMAIL>] [--with-description|-d]");
            std::process::exit(2);
        }
        if std::env::var("DATABASE_URL").is_err() {
            eprintln!("[sci group] requiere DATABASE_URL para listar grupos almacenados");
            std::process::exit(4);
        }
        let pool = match sci_persistence::build_dev_pool_from_env() {
            Ok(p) => p,
            Err(e) => { eprintln!("[sci group] pool error: {e}"); std::process::exit(5); }
        };
        let repo = sci_persistence::PgGroupRepository::new(sci_persistence::PoolProvider { pool });
        // Por defecto: sólo los grupos del usuario actual
        let owner = if all_users { None } else { Some(user.unwrap_or_else(default_owner)) };
        let groups = match repo.list(owner.as_deref()) {
            Ok(g) => g,
            Err(e) => { eprintln!("[sci group] list error: {e}"); std::process::exit(5); }
        };
        if with_description {
            println!("# {:<20} {:<10} {:<20} {}", "GroupName", "NumCodes", "Owner", "Description");
            for group in &groups {
                println!("* {:<20} {:<10} {:<20} {}",
                         group.name(),
                         group.len(),
                         group.owner(),
                         group.description());
            }
        } else {
            println!("# {:<20} {:<10} {:<20}", "GroupName", "NumCodes", "Owner");
            for group in &groups {
                println!("* {:<20} {:<10} {:<20}", group.name(), group.len(), group.owner());
            }
        }
    } else if args.len() >= 3 && args[1] == "code" && args[2] == "setup" {
        let mut label: Option<String> = None;
        let mut description: Option<String> = None;
        let mut input_handler: Option<String> = None;
        let mut folder: Option<String> = None;
        let mut rel_path: Option<String> = None;
        let mut computer_name: Option<String> = None;
        let mut computer_hostname: Option<String> = None;
        let mut remote_abs_path: Option<String> = None;
        let mut prepend_text: Option<String> = None;
        let mut append_text: Option<String> = None;
        let mut store_upload = false;
        let mut on_computer = false;
        let mut store = false;
        let mut i = 3;
        while i < args.len() {
            match args[i].as_str() {
                "--label" => { i += 1; if i < args.len() { label = Some(args[i].clone()); } }
                "--description" => { i += 1; if i < args.len() { description = Some(args[i].clone()); } }
                "--input-handler" => { i += 1; if i < args.len() { input_handler = Some(args[i].clone()); } }
                "--folder" => { i += 1; if i < args.len() { folder = Some(args[i].clone()); } }
                "--rel-path" => { i += 1; if i < args.len() { rel_path = Some(args[i].clone()); } }
                "--computer" => { i += 1; if i < args.len() { computer_name = Some(args[i].clone()); } }
                "--computer-hostname" => { i += 1; if i < args.len() { computer_hostname = Some(args[i].clone()); } }
                "--remote-abs-path" => { i += 1; if i < args.len() { remote_abs_path = Some(args[i].clone()); } }
                "--prepend-text" => { i += 1; if i < args.len() { prepend_text = Some(args[i].clone()); } }
                "--append-text" => { i += 1; if i < args.len() { append_text = Some(args[i].clone()); } }
                "--store-upload" => { store_upload = true; }
                "--on-computer" => { on_computer = true; }
                "--store" => { store = true; }
                _ => {}
            }
            i += 1;
        }
        if store_upload && on_computer {
            eprintln!("Uso: sci-cli code setup ... (--store-upload | --on-computer), no ambos");
            std::process::exit(2);
        }

        let mut builder = CodeBuilder::new();
        if store_upload {
            set_or_exit(&mut builder, KEY_CODE_TYPE, CodeSourceKind::StoreAndUpload.as_str().into());
        }
        if on_computer {
            set_or_exit(&mut builder, KEY_CODE_TYPE, CodeSourceKind::OnComputer.as_str().into());
        }
        if let Some(v) = label { set_or_exit(&mut builder, KEY_LABEL, v.into()); }
        if let Some(v) = description { set_or_exit(&mut builder, KEY_DESCRIPTION, v.into()); }
        if let Some(v) = input_handler { set_or_exit(&mut builder, KEY_INPUT_HANDLER, v.into()); }
        if let Some(v) = folder { set_or_exit(&mut builder, KEY_FOLDER, PathBuf::from(v).into()); }
        if let Some(v) = rel_path { set_or_exit(&mut builder, KEY_REL_PATH, v.into()); }
        if let Some(name) = computer_name {
            let hostname = computer_hostname.unwrap_or_else(|| name.clone());
            let computer = match Computer::new(&name, &hostname, "ssh", "direct", "/scratch") {
                Ok(c) => c,
                Err(e) => { eprintln!("[sci code] computador inválido: {e}"); std::process::exit(3); }
            };
            set_or_exit(&mut builder, KEY_COMPUTER, computer.into());
        }
        if let Some(v) = remote_abs_path { set_or_exit(&mut builder, KEY_REMOTE_ABS_PATH, PathBuf::from(v).into()); }
        if let Some(v) = prepend_text { set_or_exit(&mut builder, KEY_PREPEND_TEXT, v.into()); }
        if let Some(v) = append_text { set_or_exit(&mut builder, KEY_APPEND_TEXT, v.into()); }

        let code = match builder.build() {
            Ok(code) => code,
            Err(BuildError::Validation(messages)) => {
                eprintln!("[sci code] especificación inválida:");
                for m in &messages { eprintln!("  - {m}"); }
                std::process::exit(3);
            }
            Err(err @ BuildError::UnconsumedKeys(_)) => {
                // Clave que nadie consumió: bug del armado, no de la entrada
                eprintln!("[sci code] error interno del builder: {err}");
                std::process::exit(5);
            }
        };

        if store {
            if std::env::var("DATABASE_URL").is_err() {
                eprintln!("[sci code] --store requiere DATABASE_URL");
                std::process::exit(4);
            }
            let pool = match sci_persistence::build_dev_pool_from_env() {
                Ok(p) => p,
                Err(e) => { eprintln!("[sci code] pool error: {e}"); std::process::exit(5); }
            };
            let mut repo = sci_persistence::PgCodeRepository::new(sci_persistence::PoolProvider { pool });
            match repo.save(&code) {
                Ok(()) => println!("almacenado: id={} label={}", code.id(), code.label()),
                Err(e) => { eprintln!("[sci code] store error: {e}"); std::process::exit(5); }
            }
        } else {
            println!("code válido: label={} kind={} exec={} hash={}",
                     code.label(),
                     code.source_kind(),
                     code.execname(),
                     &code.content_hash()[..12]);
        }
    } else if args.len() >= 3 && args[1] == "code" && args[2] == "show" {
        let mut id: Option<uuid::Uuid> = None;
        let mut i = 3;
        while i < args.len() {
            if args[i].as_str() == "--id" {
                i += 1;
                if i < args.len() { id = uuid::Uuid::parse_str(&args[i]).ok(); }
            }
            i += 1;
        }
        let Some(id) = id else {
            eprintln!("Uso: sci-cli code show --id <UUID>");
            std::process::exit(2);
        };
        if std::env::var("DATABASE_URL").is_err() {
            eprintln!("[sci code] requiere DATABASE_URL para consultar códigos almacenados");
            std::process::exit(4);
        }
        let pool = match sci_persistence::build_dev_pool_from_env() {
            Ok(p) => p,
            Err(e) => { eprintln!("[sci code] pool error: {e}"); std::process::exit(5); }
        };
        let repo = sci_persistence::PgCodeRepository::new(sci_persistence::PoolProvider { pool });
        match repo.find(id) {
            Ok(code) => {
                println!("{code}");
                println!("  exec: {}", code.execname());
                println!("  input_handler: {}", code.input_handler());
                if let Some(computer) = code.computer() {
                    println!("  computer: {computer}");
                }
                println!("  hash: {}", code.content_hash());
            }
            Err(e) => { eprintln!("[sci code] no encontrado: {e}"); std::process::exit(4); }
        }
    } else {
        println!("sci-cli: use 'group list', 'code setup' or 'code show' subcommands");
    }
}

/// Dueño por defecto cuando no se pasa --user ni --all-users.
fn default_owner() -> String {
    std::env::var("SCIFLOW_OWNER").unwrap_or_else(|_| "user@localhost".to_string())
}

fn set_or_exit(builder: &mut CodeBuilder, key: &str, value: SpecValue) {
    if let Err(e) = builder.set(key, value) {
        eprintln!("[sci code] especificación inválida:");
        for m in e.messages() {
            eprintln!("  - {m}");
        }
        std::process::exit(3);
    }
}
