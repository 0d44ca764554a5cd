use super::{new_id, Where};
use crate::error::{Error, Result};
use crate::model::{Role, User};
use rusqlite::{params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde::Deserialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFilter {
    pub school_id: Option<String>,
    pub role: Option<Role>,
}

const SELECT_USERS: &str =
    "SELECT id, username, name, role, school_id, related_student_id, active FROM users";

fn map_user(r: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: r.get(0)?,
        username: r.get(1)?,
        name: r.get(2)?,
        role: r.get(3)?,
        school_id: r.get(4)?,
        related_student_id: r.get(5)?,
        active: r.get::<_, i64>(6)? != 0,
    })
}

pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

pub fn list_users(conn: &Connection, filter: &UserFilter) -> Result<Vec<User>> {
    let mut w = Where::default();
    w.eq("school_id", filter.school_id.clone())
        .eq("role", filter.role.map(|r| r.as_str().to_string()));
    let sql = format!("{}{} ORDER BY name", SELECT_USERS, w.sql());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(w.values()), map_user)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn find_user(conn: &Connection, id: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(&format!("{} WHERE id = ?", SELECT_USERS), [id], map_user)
        .optional()?)
}

pub fn get_user(conn: &Connection, id: &str) -> Result<User> {
    find_user(conn, id)?.ok_or_else(|| Error::not_found("user", id))
}

fn check_scope(conn: &Connection, user: &User) -> Result<()> {
    match user.role {
        Role::GeneralManager => Ok(()),
        role if role.is_student_scoped() => {
            let Some(sid) = user.related_student_id.as_deref() else {
                return Err(Error::invalid(format!(
                    "{} users need relatedStudentId",
                    role
                )));
            };
            let student = super::students::get_student(conn, sid)?;
            if user.school_id.as_deref().is_some_and(|s| s != student.school_id) {
                return Err(Error::invalid("related student belongs to another school"));
            }
            Ok(())
        }
        role => {
            let Some(school_id) = user.school_id.as_deref() else {
                return Err(Error::invalid(format!("{} users need schoolId", role)));
            };
            super::schools::get_school(conn, school_id).map(|_| ())
        }
    }
}

/// Upsert. A new user requires a password; an existing user keeps its
/// password unless one is given.
pub fn save_user(conn: &Connection, mut user: User, password: Option<&str>) -> Result<User> {
    user.username = user.username.trim().to_lowercase();
    user.name = user.name.trim().to_string();
    if user.username.is_empty() || user.name.is_empty() {
        return Err(Error::invalid("username and name are required"));
    }
    if user.role.is_student_scoped() && user.school_id.is_none() {
        if let Some(sid) = user.related_student_id.as_deref() {
            user.school_id = super::students::find_student(conn, sid)?.map(|s| s.school_id);
        }
    }
    check_scope(conn, &user)?;

    let is_new = user.id.trim().is_empty() || find_user(conn, &user.id)?.is_none();
    if user.id.trim().is_empty() {
        user.id = new_id();
    }
    let password = password.map(str::trim).filter(|p| !p.is_empty());

    let res = if is_new {
        let Some(pw) = password else {
            return Err(Error::invalid("password is required for new users"));
        };
        let salt = new_id();
        conn.execute(
            "INSERT INTO users(id, username, name, role, school_id, related_student_id, active,
                               password_salt, password_hash)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &user.id,
                &user.username,
                &user.name,
                user.role,
                &user.school_id,
                &user.related_student_id,
                user.active as i64,
                &salt,
                hash_password(&salt, pw),
            ),
        )
    } else {
        conn.execute(
            "UPDATE users SET username = ?, name = ?, role = ?, school_id = ?,
                              related_student_id = ?, active = ?
             WHERE id = ?",
            (
                &user.username,
                &user.name,
                user.role,
                &user.school_id,
                &user.related_student_id,
                user.active as i64,
                &user.id,
            ),
        )
        .and_then(|n| match password {
            Some(pw) => {
                let salt = new_id();
                conn.execute(
                    "UPDATE users SET password_salt = ?, password_hash = ? WHERE id = ?",
                    (&salt, hash_password(&salt, pw), &user.id),
                )
            }
            None => Ok(n),
        })
    };
    match res {
        Ok(_) => Ok(user),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Err(Error::conflict(format!(
                "username {} is taken",
                user.username
            )))
        }
        Err(e) => Err(e.into()),
    }
}

/// Returns the user when the credentials match an active account.
pub fn verify_login(conn: &Connection, username: &str, password: &str) -> Result<Option<User>> {
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT id, password_salt, password_hash FROM users WHERE username = ? AND active = 1",
            [username.trim().to_lowercase()],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((id, salt, hash)) = row else {
        return Ok(None);
    };
    if hash_password(&salt, password) != hash {
        return Ok(None);
    }
    find_user(conn, &id)
}

pub fn delete_user(conn: &Connection, id: &str) -> Result<()> {
    let n = conn.execute("DELETE FROM users WHERE id = ?", [id])?;
    if n == 0 {
        return Err(Error::not_found("user", id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{open_temp, seed_school, seed_student};

    fn user(username: &str, role: Role, school_id: Option<&str>) -> User {
        User {
            id: String::new(),
            username: username.into(),
            name: username.to_uppercase(),
            role,
            school_id: school_id.map(str::to_string),
            related_student_id: None,
            active: true,
        }
    }

    #[test]
    fn login_checks_salted_hash() {
        let (conn, ws) = open_temp();
        let school = seed_school(&conn, "A");
        let u = save_user(&conn, user("Mona", Role::Teacher, Some(&school.id)), Some("pw1"))
            .unwrap();
        assert_eq!(u.username, "mona");
        assert!(verify_login(&conn, "MONA", "pw1").unwrap().is_some());
        assert!(verify_login(&conn, "mona", "wrong").unwrap().is_none());
        assert!(verify_login(&conn, "nobody", "pw1").unwrap().is_none());
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn update_without_password_keeps_old_one() {
        let (conn, ws) = open_temp();
        let school = seed_school(&conn, "A");
        let mut u =
            save_user(&conn, user("omar", Role::Staff, Some(&school.id)), Some("pw")).unwrap();
        u.name = "Omar K".into();
        save_user(&conn, u.clone(), None).unwrap();
        assert_eq!(get_user(&conn, &u.id).unwrap().name, "Omar K");
        assert!(verify_login(&conn, "omar", "pw").unwrap().is_some());
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn duplicate_username_is_conflict() {
        let (conn, ws) = open_temp();
        save_user(&conn, user("gm", Role::GeneralManager, None), Some("x")).unwrap();
        let err = save_user(&conn, user("GM", Role::GeneralManager, None), Some("y")).unwrap_err();
        assert_eq!(err.code(), "conflict");
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn parent_needs_related_student_and_inherits_school() {
        let (conn, ws) = open_temp();
        let school = seed_school(&conn, "A");
        let st = seed_student(&conn, &school.id, "Ali", "5A");
        assert!(save_user(&conn, user("dad", Role::Parent, None), Some("x")).is_err());
        let mut parent = user("dad", Role::Parent, None);
        parent.related_student_id = Some(st.id.clone());
        let saved = save_user(&conn, parent, Some("x")).unwrap();
        assert_eq!(saved.school_id.as_deref(), Some(school.id.as_str()));
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn school_roles_need_school() {
        let (conn, ws) = open_temp();
        let err = save_user(&conn, user("p", Role::Principal, None), Some("x")).unwrap_err();
        assert_eq!(err.code(), "bad_params");
        let _ = std::fs::remove_dir_all(ws);
    }
}
