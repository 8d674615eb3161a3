//! Wire protocol for the chat endpoint.
//!
//! Each WebSocket frame carries one JSON request in or one JSON response out.
//! Requests and their successful responses share the numeric range 101-109;
//! error responses occupy 1001-1008. The response envelope always carries all
//! four keys (`roomName`, `rspType`, `content`, `list`), with `list` an empty
//! array when there are no entries, so the wire format stays stable.

use serde::{Deserialize, Serialize};

/// Numeric request codes, starting at 101.
///
/// Codes this server does not understand decode to [`ReqType::Unknown`] so
/// the request can still be routed and answered with `ErrUnknownReq` instead
/// of failing the whole frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum ReqType {
    SetNickname,
    GetNickname,
    ListRooms,
    Join,
    ListNames,
    Hide,
    Unhide,
    Message,
    Leave,
    Unknown(u16),
}

impl From<u16> for ReqType {
    fn from(code: u16) -> Self {
        match code {
            101 => Self::SetNickname,
            102 => Self::GetNickname,
            103 => Self::ListRooms,
            104 => Self::Join,
            105 => Self::ListNames,
            106 => Self::Hide,
            107 => Self::Unhide,
            108 => Self::Message,
            109 => Self::Leave,
            other => Self::Unknown(other),
        }
    }
}

impl From<ReqType> for u16 {
    fn from(req: ReqType) -> Self {
        match req {
            ReqType::SetNickname => 101,
            ReqType::GetNickname => 102,
            ReqType::ListRooms => 103,
            ReqType::Join => 104,
            ReqType::ListNames => 105,
            ReqType::Hide => 106,
            ReqType::Unhide => 107,
            ReqType::Message => 108,
            ReqType::Leave => 109,
            ReqType::Unknown(code) => code,
        }
    }
}

impl Default for ReqType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

/// Numeric response codes. Successful responses mirror their request code;
/// errors start at 1001.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum RspType {
    SetNickname,
    GetNickname,
    ListRooms,
    Join,
    ListNames,
    Hide,
    Unhide,
    Message,
    Leave,
    ErrRoomMandatory,
    ErrMaxRoomsReached,
    ErrNicknameMandatory,
    ErrAlreadyJoined,
    ErrNicknameUsed,
    ErrHiddenNickname,
    ErrNotInRoom,
    ErrUnknownReq,
}

impl From<RspType> for u16 {
    fn from(rsp: RspType) -> Self {
        match rsp {
            RspType::SetNickname => 101,
            RspType::GetNickname => 102,
            RspType::ListRooms => 103,
            RspType::Join => 104,
            RspType::ListNames => 105,
            RspType::Hide => 106,
            RspType::Unhide => 107,
            RspType::Message => 108,
            RspType::Leave => 109,
            RspType::ErrRoomMandatory => 1001,
            RspType::ErrMaxRoomsReached => 1002,
            RspType::ErrNicknameMandatory => 1003,
            RspType::ErrAlreadyJoined => 1004,
            RspType::ErrNicknameUsed => 1005,
            RspType::ErrHiddenNickname => 1006,
            RspType::ErrNotInRoom => 1007,
            RspType::ErrUnknownReq => 1008,
        }
    }
}

impl TryFrom<u16> for RspType {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            101 => Ok(Self::SetNickname),
            102 => Ok(Self::GetNickname),
            103 => Ok(Self::ListRooms),
            104 => Ok(Self::Join),
            105 => Ok(Self::ListNames),
            106 => Ok(Self::Hide),
            107 => Ok(Self::Unhide),
            108 => Ok(Self::Message),
            109 => Ok(Self::Leave),
            1001 => Ok(Self::ErrRoomMandatory),
            1002 => Ok(Self::ErrMaxRoomsReached),
            1003 => Ok(Self::ErrNicknameMandatory),
            1004 => Ok(Self::ErrAlreadyJoined),
            1005 => Ok(Self::ErrNicknameUsed),
            1006 => Ok(Self::ErrHiddenNickname),
            1007 => Ok(Self::ErrNotInRoom),
            1008 => Ok(Self::ErrUnknownReq),
            other => Err(format!("unknown response code {other}")),
        }
    }
}

/// One decoded client request. All fields are optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatRequest {
    /// Target room; empty for chatter-local operations.
    pub room_name: String,
    pub req_type: ReqType,
    /// Nickname value, message body, or `"hidden"` on a silent join.
    pub content: String,
}

/// One response frame sent back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Originating room; empty for chatter-local responses.
    pub room_name: String,
    pub rsp_type: RspType,
    pub content: String,
    /// Room or name listings. Always present on the wire.
    pub list: Vec<String>,
}

impl ChatResponse {
    pub fn new(
        room_name: impl Into<String>,
        rsp_type: RspType,
        content: impl Into<String>,
        list: Vec<String>,
    ) -> Self {
        Self {
            room_name: room_name.into(),
            rsp_type,
            content: content.into(),
            list,
        }
    }
}
