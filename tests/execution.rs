#![cfg(feature = "test-utils")]

use std::pin::pin;
use std::time::Duration;

use futures_util::TryStreamExt;
use tokio::runtime::Runtime;

use pg_rowmap::test_utils::EmbeddedDb;
use pg_rowmap::{DbError, DbValue, FromRow, ParamSet, RowReader, TransactionGroup};

struct Widget {
    id: i32,
    name: String,
}

impl FromRow for Widget {
    fn from_row(reader: &RowReader<'_>) -> Result<Self, DbError> {
        Ok(Self {
            id: reader.int("id")?,
            name: reader.text("name")?,
        })
    }
}

#[test]
fn execute_and_query_cover_the_result_shapes() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let db = EmbeddedDb::start().await?;
        let mut client = db.connect().await?;

        client
            .execute_script(
                "create table widgets (id int4 primary key, name text not null, sold bool not null default false)",
            )
            .await?;

        for (id, name) in [(1_i32, "anvil"), (2, "bolt"), (3, "crate")] {
            let inserted = client
                .statement("insert into widgets (id, name) values (@id, @name)")
                .bind("id", id)
                .bind("name", name)
                .execute()
                .await?;
            assert_eq!(inserted, 1);
        }

        let updated = client
            .statement("update widgets set sold = true where id < @max")
            .bind("max", 3_i32)
            .execute()
            .await?;
        assert_eq!(updated, 2);

        // count(*) comes back as int8
        let total = client
            .statement("select count(*) from widgets")
            .query_scalar()
            .await?;
        assert_eq!(total, DbValue::Long(3));

        let table = client
            .statement("select id, name from widgets where id > @min")
            .bind("min", 100_i32)
            .query_table()
            .await?;
        assert!(table.is_empty());
        assert_eq!(table.columns().names(), ["id", "name"]);

        let err = client
            .statement("select id from widgets where id > @min")
            .bind("min", 100_i32)
            .query_scalar()
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NoResults));

        let widgets: Vec<Widget> = client
            .statement("select id, name from widgets order by id")
            .query_as()
            .await?;
        assert_eq!(widgets.len(), 3);
        assert_eq!(widgets[0].id, 1);
        assert_eq!(widgets[2].name, "crate");

        // a bad column name aborts the whole mapped read
        let err = client
            .statement("select id, name from widgets")
            .query_mapped(|r| r.text("label"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ColumnNotFound(_)));

        db.stop().await;
        Ok(())
    })
}

#[test]
fn sequences_scripts_and_binder_failures() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let db = EmbeddedDb::start().await?;
        let mut client = db.connect().await?;

        let tables = client
            .execute_many(&[
                "create table seq_t (id int4)",
                "insert into seq_t (id) values (1)",
                "select id from seq_t",
            ])
            .await?;
        assert_eq!(tables.len(), 3);
        assert!(tables[0].is_empty());
        assert_eq!(tables[2].rows()[0].get("id"), Some(&DbValue::Int(1)));

        client
            .execute_script("create table s1 (id int4); insert into s1 values (41);")
            .await?;
        let got = client.statement("select id from s1").query_scalar().await?;
        assert_eq!(got, DbValue::Int(41));

        // explicit preparation reuses the statement across executions
        for id in 10..13 {
            let inserted = client
                .statement("insert into seq_t (id) values (@id)")
                .bind("id", id)
                .prepare(true)
                .execute()
                .await?;
            assert_eq!(inserted, 1);
        }

        // binder failures surface before anything reaches the server
        let err = client
            .statement("select @a, @b")
            .bind("a", 1_i32)
            .query_scalar()
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Parameter(_)));

        let err = client
            .statement("select $1")
            .bind("x", 1_i32)
            .query_scalar()
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Parameter(_)));

        let err = client
            .statement("select @a")
            .bind("a", 1_i32)
            .bind("@a", 2_i32)
            .query_scalar()
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Parameter(_)));

        db.stop().await;
        Ok(())
    })
}

#[test]
fn transaction_commits_every_set_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let db = EmbeddedDb::start().await?;
        let mut client = db.connect().await?;

        client
            .execute_script("create table entries (id int4 primary key, note text)")
            .await?;

        let groups = [TransactionGroup::new(
            "insert into entries (id, note) values (@id, @note)",
        )
        .with_set(ParamSet::new().bind("id", 1_i32).bind("note", "first test"))
        .with_set(ParamSet::new().bind("id", 2_i32).bind("note", "second test"))
        .with_set(ParamSet::new().bind("id", 3_i32).bind("note", "third test"))];

        let counts = client.execute_transaction(&groups).await?;
        assert_eq!(counts, [1, 1, 1]);

        let rows: Vec<(i32, String)> = client
            .statement("select id, note from entries order by id")
            .query_mapped(|r| Ok((r.int("id")?, r.text("note")?)))
            .await?;
        assert_eq!(
            rows,
            [
                (1, "first test".to_string()),
                (2, "second test".to_string()),
                (3, "third test".to_string()),
            ]
        );

        db.stop().await;
        Ok(())
    })
}

#[test]
fn failed_transactions_roll_back_but_sequences_do_not() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let db = EmbeddedDb::start().await?;
        let mut client = db.connect().await?;

        client
            .execute_script(
                "create table entries (id int4 primary key, note text);
                 insert into entries (id, note) values (1, 'a'), (2, 'b'), (3, 'c');",
            )
            .await?;

        // the second set of the second group violates the primary key
        let groups = [
            TransactionGroup::new("delete from entries"),
            TransactionGroup::new("insert into entries (id, note) values (@id, @note)")
                .with_set(ParamSet::new().bind("id", 9_i32).bind("note", "ok"))
                .with_set(ParamSet::new().bind("id", 9_i32).bind("note", "duplicate")),
        ];
        let err = client.execute_transaction(&groups).await.unwrap_err();
        match err {
            DbError::TransactionAborted {
                statement_index,
                param_set_index,
                source,
            } => {
                assert_eq!(statement_index, 1);
                assert_eq!(param_set_index, 1);
                match *source {
                    DbError::Statement { code, .. } => {
                        assert_eq!(code.as_deref(), Some("23505"));
                    }
                    other => panic!("expected Statement, got {other}"),
                }
            }
            other => panic!("expected TransactionAborted, got {other}"),
        }

        // everything rolled back, the delete included
        let total = client
            .statement("select count(*) from entries")
            .query_scalar()
            .await?;
        assert_eq!(total, DbValue::Long(3));

        // the sequential runner has no rollback: the delete persists
        let err = client
            .execute_many(&[
                "delete from entries",
                "insert into entries (id) values (1), (1)",
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Statement { .. }));

        let total = client
            .statement("select count(*) from entries")
            .query_scalar()
            .await?;
        assert_eq!(total, DbValue::Long(0));

        db.stop().await;
        Ok(())
    })
}

#[test]
fn streaming_yields_rows_one_at_a_time() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let db = EmbeddedDb::start().await?;
        let mut client = db.connect().await?;

        client
            .execute_script("create table stream_t (id int4 primary key)")
            .await?;
        let inserted = client
            .statement("insert into stream_t (id) select generate_series(@from, @to)")
            .bind("from", 1_i32)
            .bind("to", 5_i32)
            .execute()
            .await?;
        assert_eq!(inserted, 5);

        {
            let stream = client
                .statement("select id from stream_t order by id")
                .query_stream(|r| r.int("id"));
            let mut stream = pin!(stream);
            let mut seen = Vec::new();
            while let Some(id) = stream.try_next().await? {
                seen.push(id);
            }
            assert_eq!(seen, [1, 2, 3, 4, 5]);
        }

        // the first mapping failure ends the stream with that error
        {
            let stream = client
                .statement("select id from stream_t order by id")
                .query_stream(|r| {
                    let id = r.int("id")?;
                    if id < 3 { Ok(id) } else { r.text("id").map(|_| 0) }
                });
            let mut stream = pin!(stream);
            assert_eq!(stream.try_next().await?, Some(1));
            assert_eq!(stream.try_next().await?, Some(2));
            assert!(matches!(
                stream.try_next().await,
                Err(DbError::TypeMismatch { .. })
            ));
            assert_eq!(stream.try_next().await?, None);
        }

        db.stop().await;
        Ok(())
    })
}

#[test]
fn slow_statements_time_out_and_the_connection_survives() -> Result<(), Box<dyn std::error::Error>>
{
    let rt = Runtime::new()?;
    rt.block_on(async {
        let db = EmbeddedDb::start().await?;
        let mut client = db.connect().await?;

        let err = client
            .statement("select pg_sleep(@secs)")
            .bind("secs", 5.0_f64)
            .timeout(Duration::from_millis(200))
            .query_scalar()
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Timeout { millis: 200 }));

        // the cancelled call does not poison the connection
        let got = client
            .statement("select @x")
            .bind("x", 1_i32)
            .query_scalar()
            .await?;
        assert_eq!(got, DbValue::Int(1));

        db.stop().await;
        Ok(())
    })
}
