//! The default handler set (§4.5's "representative set" plus the
//! supplemental verbs `original_source/xbdm_emulator_async.py` carries).
//!
//! Each handler is a plain function registered into a [`Dispatcher`] by
//! [`register_all`] — no handler ever writes to the wire; it only builds a
//! [`ReplyPlan`] from `(Message, Services)`.

use xbdm_types::fs::VirtualPath;
use xbdm_types::{FileTime, Message, Parameter, Record, ResultCode};

use crate::dispatch::{Dispatcher, Services};
use crate::error::HandlerError;
use crate::reply::{ReceiveKind, ReplyPlan};

fn require_str<'m>(msg: &'m Message, key: &'static str) -> Result<&'m str, HandlerError> {
    msg.params
        .get(key)
        .and_then(Parameter::as_str)
        .ok_or(HandlerError::BadParam(key))
}

fn require_u32(msg: &Message, key: &'static str) -> Result<u32, HandlerError> {
    msg.params
        .get(key)
        .and_then(Parameter::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(HandlerError::BadParam(key))
}

fn require_path(msg: &Message, key: &'static str) -> Result<VirtualPath, HandlerError> {
    require_str(msg, key).map(VirtualPath::new)
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, HandlerError> {
    if hex.len() % 2 != 0 {
        return Err(HandlerError::BadParam("data"));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| HandlerError::BadParam("data")))
        .collect()
}

fn systime(_msg: &Message, _services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let (high, low) = FileTime::now().split();
    Ok(ReplyPlan::Single(
        Message::response(200).with_param("high", high).with_param("low", low),
    ))
}

fn setsystime(msg: &Message, _services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    // The offset is recorded nowhere: there is no hardware clock to adjust in
    // this emulation, matching the source's own no-op handling.
    require_u32(msg, "clocklo")?;
    require_u32(msg, "clockhi")?;
    Ok(ReplyPlan::ok())
}

fn systeminfo(_msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let hdd_gb = services.config.hdd_size_bytes() / (1024 * 1024 * 1024);
    let records = vec![
        Record::new().with_param("HDD", format!("{hdd_gb}GB")),
        Record::new().with_param("Type", "Devkit"),
        Record::new()
            .with_param("Platform", "Xbox")
            .with_param("System", services.config.console_name()),
        Record::new()
            .with_param("BaseKrnl", "1.0")
            .with_param("Krnl", "1.0")
            .with_param("XDK", "1.0"),
    ];
    Ok(ReplyPlan::MultiLine(records))
}

fn drivelist(_msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let records = services
        .config
        .drives()
        .into_iter()
        .map(|d| Record::new().with_param("drivename", d.name))
        .collect();
    Ok(ReplyPlan::MultiLine(records))
}

fn module_record(module: &xbdm_types::config::ModuleInfo) -> Record {
    Record::new()
        .with_param("name", module.name.as_str())
        .with_param("base", module.base_address)
        .with_param("size", module.size)
        .with_param("check", 0u32)
        .with_param("timestamp", 0u32)
        .with_param("pdata", 0u32)
        .with_param("psize", 0u32)
        .with_param("thread", 0u32)
        .with_param("osize", 0u32)
}

/// Lists every loaded module, or (when `name=` is given) just the one
/// requested — `402` if it isn't loaded.
fn modules(msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let modules = services.config.modules();
    if let Some(name) = msg.params.get("name").and_then(Parameter::as_str) {
        let module = modules
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| HandlerError::NotFound(name.to_string()))?;
        return Ok(ReplyPlan::MultiLine(vec![module_record(module)]));
    }
    Ok(ReplyPlan::MultiLine(modules.iter().map(module_record).collect()))
}

fn entry_record(name: &str, meta: &xbdm_types::FileMeta) -> Record {
    let (createhi, createlo) = meta.created.split();
    let (changehi, changelo) = meta.modified.split();
    let (sizehi, sizelo) = ((meta.size >> 32) as u32, meta.size as u32);
    let mut record = Record::new()
        .with_param("name", name)
        .with_param("sizehi", sizehi)
        .with_param("sizelo", sizelo)
        .with_param("createhi", createhi)
        .with_param("createlo", createlo)
        .with_param("changehi", changehi)
        .with_param("changelo", changelo);
    if meta.is_directory {
        record = record.with_flag("directory");
    }
    record
}

fn dirlist(msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let path = require_path(msg, "name")?;
    let entries = services.fs.list_dir(&path)?;
    let records = entries.iter().map(|e| entry_record(&e.name, &e.meta)).collect();
    Ok(ReplyPlan::MultiLine(records))
}

fn getfileattributes(msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let path = require_path(msg, "name")?;
    let meta = services.fs.stat(&path)?;
    let name = path.components().last().unwrap_or(path.as_str()).to_string();
    Ok(ReplyPlan::MultiLine(vec![entry_record(&name, &meta)]))
}

fn getfile(msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let path = require_path(msg, "name")?;
    let mut reader = services.fs.open_read(&path)?;
    let mut data = Vec::new();
    std::io::Read::read_to_end(&mut reader, &mut data).map_err(|e| HandlerError::Generic(e.to_string()))?;
    let mut blob = (data.len() as u32).to_le_bytes().to_vec();
    blob.extend_from_slice(&data);
    Ok(ReplyPlan::Binary { params: Vec::new(), blob })
}

/// `203- binary response follows` + framebuffer header params + raw pixel
/// bytes. The pixel/tile layout conversion is out of scope (`spec.md` line
/// 13); this forwards whatever bytes the configured screenshot source hands
/// back, uninterpreted, the same way `getfile` forwards file bytes.
fn screenshot(_msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let shot = services
        .config
        .screenshot_source()
        .ok_or_else(|| HandlerError::NotFound("screenshot".to_string()))?;
    let params = vec![
        ("pitch".to_string(), Parameter::Dword(shot.pitch)),
        ("width".to_string(), Parameter::Dword(shot.width)),
        ("height".to_string(), Parameter::Dword(shot.height)),
        ("format".to_string(), Parameter::Dword(shot.format)),
        ("offsetx".to_string(), Parameter::Dword(shot.offset_x)),
        ("offsety".to_string(), Parameter::Dword(shot.offset_y)),
        ("framebuffersize".to_string(), Parameter::Dword(shot.data.len() as u32)),
        ("sw".to_string(), Parameter::Dword(shot.screen_width)),
        ("sh".to_string(), Parameter::Dword(shot.screen_height)),
        ("colorspace".to_string(), Parameter::Dword(shot.colorspace)),
    ];
    Ok(ReplyPlan::Binary { params, blob: shot.data })
}

fn sendfile(msg: &Message, _services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let path = require_path(msg, "name")?;
    let len = require_u32(msg, "length")?;
    Ok(ReplyPlan::StartReceiveSingle { path, len: u64::from(len), kind: ReceiveKind::Plain })
}

fn sendvfile(msg: &Message, _services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let count = msg
        .params
        .get("count")
        .and_then(Parameter::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(HandlerError::BadParam("count"))?;
    Ok(ReplyPlan::StartReceiveMulti { count })
}

fn delete(msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let path = require_path(msg, "name")?;
    if msg.flags.contains("dir") {
        services.fs.remove_tree(&path)?;
    } else {
        services.fs.remove(&path)?;
    }
    Ok(ReplyPlan::ok())
}

fn mkdir(msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let path = require_path(msg, "name")?;
    services.fs.mkdir(&path)?;
    Ok(ReplyPlan::ok())
}

fn rename(msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let from = require_path(msg, "name")?;
    let to = require_path(msg, "newname")?;
    services.fs.rename(&from, &to)?;
    Ok(ReplyPlan::ok())
}

/// Shared by `getmem` and its `getmemex` alias. The payload shape is
/// multi-line hex: one `202-`/`.`-framed line of hex per chunk, rather than
/// a single opaque binary blob.
const GETMEM_CHUNK_BYTES: u32 = 240;

fn getmem(msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let addr = require_u32(msg, "addr")?;
    let length = require_u32(msg, "length")?;
    let bytes = services
        .memory
        .read(addr, length)
        .map_err(|e| HandlerError::Generic(e.to_string()))?;

    let records = bytes
        .chunks(GETMEM_CHUNK_BYTES as usize)
        .map(|chunk| Record::new().with_param("data", Parameter::String(encode_hex(chunk))))
        .collect();
    Ok(ReplyPlan::MultiLine(records))
}

fn setmem(msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let addr = require_u32(msg, "addr")?;
    let hex = require_str(msg, "data")?;
    let bytes = decode_hex(hex)?;
    services
        .memory
        .write(addr, &bytes)
        .map_err(|e| HandlerError::Generic(e.to_string()))?;
    Ok(ReplyPlan::ok_with_text(format!("set {} bytes", bytes.len())))
}

fn bye(_msg: &Message, _services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    Ok(ReplyPlan::CloseAfter(Message::response(200).with_flag("bye")))
}

fn magicboot(_msg: &Message, _services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    Ok(ReplyPlan::CloseAfter(Message::response(200)))
}

fn notify(msg: &Message, _services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    require_u32(msg, "reconnectport")?;
    Ok(ReplyPlan::Single(ResultCode::NotificationChannel.reason().split_ascii_whitespace().fold(
        Message::response(ResultCode::NotificationChannel.code()),
        Message::with_flag,
    )))
}

fn altaddr(_msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let addr = services.config.alternate_ip().unwrap_or(0);
    Ok(ReplyPlan::Single(Message::response(200).with_param("addr", addr)))
}

fn debugoptions(_msg: &Message, _services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    Ok(ReplyPlan::ok())
}

fn isdebugger(_msg: &Message, _services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    Ok(ReplyPlan::error(410, xbdm_types::ResultCode::IsDebugger.reason()))
}

/// `xbupdate!sysfileupd`'s four variants, distinguished by which parameter
/// is present (§4.5). Exactly one of `remove`/`removedir`/`size`+`crc`/
/// `localsrc` is expected per call; an absent discriminant is a bad request.
fn xbupdate_sysfileupd(msg: &Message, services: &Services<'_>) -> Result<ReplyPlan, HandlerError> {
    let path = require_path(msg, "name")?;

    if msg.params.contains("remove") {
        services.fs.remove(&path)?;
        return Ok(ReplyPlan::ok());
    }
    if msg.params.contains("removedir") {
        services.fs.remove_tree(&path)?;
        return Ok(ReplyPlan::ok());
    }
    if let Some(local_src) = msg.params.get("localsrc").and_then(Parameter::as_str) {
        services.fs.rename(&VirtualPath::new(local_src), &path)?;
        return Ok(ReplyPlan::ok());
    }
    if msg.params.contains("size") && msg.params.contains("crc") {
        let size = require_u32(msg, "size")?;
        let crc = require_u32(msg, "crc")?;
        return Ok(ReplyPlan::StartReceiveSingle {
            path,
            len: u64::from(size),
            kind: ReceiveKind::Xbupdate { expected_crc: crc },
        });
    }
    Err(HandlerError::BadParam("remove|removedir|localsrc|size+crc"))
}

pub fn register_all(dispatcher: &mut Dispatcher) {
    dispatcher.register("bye", bye);
    dispatcher.register("systime", systime);
    dispatcher.register("setsystime", setsystime);
    dispatcher.register("systeminfo", systeminfo);
    dispatcher.register("drivelist", drivelist);
    dispatcher.register("modules", modules);
    dispatcher.register("dirlist", dirlist);
    dispatcher.register("getfileattributes", getfileattributes);
    dispatcher.register("getfile", getfile);
    dispatcher.register("screenshot", screenshot);
    dispatcher.register("sendfile", sendfile);
    dispatcher.register("sendvfile", sendvfile);
    dispatcher.register("delete", delete);
    dispatcher.register("mkdir", mkdir);
    dispatcher.register("rename", rename);
    dispatcher.register("getmem", getmem);
    dispatcher.register("getmemex", getmem);
    dispatcher.register("setmem", setmem);
    dispatcher.register("magicboot", magicboot);
    dispatcher.register("notify", notify);
    dispatcher.register("altaddr", altaddr);
    dispatcher.register("debugoptions", debugoptions);
    dispatcher.register("isdebugger", isdebugger);
    dispatcher.register("xbupdate!sysfileupd", xbupdate_sysfileupd);
}
