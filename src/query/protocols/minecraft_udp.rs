//! The GameSpot 4 based query protocol that Minecraft servers speak over UDP
//! when `enable-query` is on.
//!
//! A query is three datagrams each way: a handshake to get a challenge token,
//! then a "full stat" request that echoes the token back. The full stat
//! response is a list of null-terminated key/value pairs followed by a list
//! of null-terminated player names.

use std::{num::ParseIntError, sync::LazyLock};

use parking_lot::Mutex;
use rand::{RngCore, SeedableRng, rngs::StdRng};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, trace};

use super::{Network, Protocol, QueryError, Response, Step};
use crate::{
    net::Transport,
    packet::{ByteOrder, PacketReader, PacketWriter},
};

const MAGIC: [u8; 2] = [0xFE, 0xFD];
const HANDSHAKE_TYPE: u8 = 0x09;
const STAT_TYPE: u8 = 0x00;
/// Servers only accept session ids where the high nibble of every byte is 0.
const SESSION_ID_MASK: i32 = 0x0F0F0F0F;
/// Padding the request with 4 bytes is what makes it a full stat instead of a
/// basic stat.
const FULL_STAT_PADDING: [u8; 4] = [0; 4];
/// `splitnum\0\x80\0`
const KEY_VALUE_HEADER_LEN: usize = 11;
/// `\x01player_\0\0`
const PLAYERS_HEADER_LEN: usize = 10;

static SESSION_RNG: LazyLock<Mutex<StdRng>> =
    LazyLock::new(|| Mutex::new(StdRng::from_entropy()));

static FORMATTING_CODE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new("§.").unwrap());

#[derive(Clone, Copy, Debug, Default)]
pub struct MinecraftUdp;

impl Protocol for MinecraftUdp {
    fn names(&self) -> &'static [&'static str] {
        &["minecraft", "minecraft_udp"]
    }

    fn default_port(&self) -> u16 {
        25565
    }

    fn priority(&self) -> u16 {
        10
    }

    fn network(&self) -> Network {
        Network::Udp
    }

    fn execute(&self, transport: &mut dyn Transport) -> Result<Response, QueryError> {
        query_full_stat(transport, new_session_id()).map(Response::MinecraftUdp)
    }
}

/// Everything a full stat response tells us about the server.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FullStat {
    /// The message of the day, including any `§` formatting codes.
    pub hostname: String,
    pub game_type: String,
    pub game_id: String,
    pub version: String,
    pub plugins: String,
    pub map: String,
    pub num_players: u16,
    pub max_players: u16,
    pub host_port: u16,
    pub host_ip: String,
    pub players: Vec<String>,
}

impl FullStat {
    /// The message of the day with formatting codes removed.
    pub fn plain_hostname(&self) -> String {
        FORMATTING_CODE_REGEX
            .replace_all(&self.hostname, "")
            .into_owned()
    }

    fn set(&mut self, key: StatKey, value: String) {
        match key {
            StatKey::Hostname => self.hostname = value,
            StatKey::GameType => self.game_type = value,
            StatKey::GameId => self.game_id = value,
            StatKey::Version => self.version = value,
            StatKey::Plugins => self.plugins = value,
            StatKey::Map => self.map = value,
            StatKey::NumPlayers => self.num_players = parse_numeric(key, &value),
            StatKey::MaxPlayers => self.max_players = parse_numeric(key, &value),
            StatKey::HostPort => self.host_port = parse_numeric(key, &value),
            StatKey::HostIp => self.host_ip = value,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, enum_utils::FromStr)]
enum StatKey {
    #[enumeration(rename = "hostname")]
    Hostname,
    #[enumeration(rename = "gametype")]
    GameType,
    #[enumeration(rename = "game_id")]
    GameId,
    #[enumeration(rename = "version")]
    Version,
    #[enumeration(rename = "plugins")]
    Plugins,
    #[enumeration(rename = "map")]
    Map,
    #[enumeration(rename = "numplayers")]
    NumPlayers,
    #[enumeration(rename = "maxplayers")]
    MaxPlayers,
    #[enumeration(rename = "hostport")]
    HostPort,
    #[enumeration(rename = "hostip")]
    HostIp,
}

/// A bad number isn't worth failing the whole query over, so it becomes 0.
fn parse_numeric(key: StatKey, value: &str) -> u16 {
    value.parse().unwrap_or_else(|err| {
        debug!("ignoring invalid {key:?} value {value:?}: {err}");
        0
    })
}

pub fn generate_session_id<R: RngCore + ?Sized>(rng: &mut R) -> i32 {
    rng.next_u32() as i32 & SESSION_ID_MASK
}

/// A session id drawn from the process-wide generator, which is seeded once.
pub fn new_session_id() -> i32 {
    generate_session_id(&mut *SESSION_RNG.lock())
}

/// The server sends the challenge token as decimal text but wants it back as
/// a big-endian 32-bit integer.
pub fn parse_challenge_token(token: &str) -> Result<[u8; 4], ParseIntError> {
    Ok(token.parse::<i32>()?.to_be_bytes())
}

pub fn query_full_stat(
    transport: &mut dyn Transport,
    session_id: i32,
) -> Result<FullStat, QueryError> {
    let mut packet = PacketWriter::new(ByteOrder::BigEndian);
    packet
        .write_raw(&MAGIC)
        .write_u8(HANDSHAKE_TYPE)
        .write_i32(session_id);
    transport.send(packet.as_bytes())?;

    let handshake = transport.receive()?;
    let mut reader = PacketReader::new(&handshake, ByteOrder::BigEndian);
    read_header(&mut reader, Step::Handshake, HANDSHAKE_TYPE, session_id)?;
    let token = reader.read_string();
    let challenge_token = parse_challenge_token(&token)
        .map_err(|source| QueryError::InvalidChallengeToken { token, source })?;
    trace!("got challenge token {challenge_token:?} for session {session_id}");

    packet.clear();
    packet
        .write_raw(&MAGIC)
        .write_u8(STAT_TYPE)
        .write_i32(session_id)
        .write_raw(&challenge_token)
        .write_raw(&FULL_STAT_PADDING);
    transport.send(packet.as_bytes())?;

    let response = transport.receive()?;
    let mut reader = PacketReader::new(&response, ByteOrder::BigEndian);
    read_header(&mut reader, Step::FullStat, STAT_TYPE, session_id)?;
    reader.forward(KEY_VALUE_HEADER_LEN);

    let stat = decode_full_stat(&mut reader);
    debug!(
        "session {session_id} got full stat with {} players listed",
        stat.players.len()
    );
    Ok(stat)
}

/// Check the type byte and echoed session id that start every response.
fn read_header(
    reader: &mut PacketReader,
    step: Step,
    expected: u8,
    session_id: i32,
) -> Result<(), QueryError> {
    let got = reader
        .read_u8()
        .map_err(|_| QueryError::Truncated { step })?;
    if got != expected {
        return Err(QueryError::UnexpectedResponse {
            step,
            expected,
            got,
        });
    }

    let echoed = reader
        .read_i32()
        .map_err(|_| QueryError::Truncated { step })?;
    if echoed != session_id {
        return Err(QueryError::SessionMismatch {
            step,
            expected: session_id,
            got: echoed,
        });
    }

    Ok(())
}

/// Decode the body of a full stat response. The reader must be positioned at
/// the start of the key/value section.
pub fn decode_full_stat(reader: &mut PacketReader) -> FullStat {
    let mut stat = FullStat::default();

    loop {
        let key = reader.read_string();
        if key.is_empty() {
            break;
        }
        let value = reader.read_string();

        match key.parse::<StatKey>() {
            Ok(key) => stat.set(key, value),
            Err(()) => trace!("ignoring unknown key {key:?}"),
        }
    }

    reader.forward(PLAYERS_HEADER_LEN);

    loop {
        let player = reader.read_string();
        if player.is_empty() {
            break;
        }
        stat.players.push(player);
    }

    stat
}
